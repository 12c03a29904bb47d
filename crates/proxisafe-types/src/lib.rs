use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Environmental readings produced by the telemetry source.
///
/// Read copies are plain values; only the sensor bank mutates its own copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub temperature_c: f64,
    pub pressure_bar: f64,
    pub load_pct: f64,
    pub vibration: f64,
    pub humidity: f64,
    /// Parts per minute; integer counter, not a normalised signal.
    pub throughput: u32,
}

impl Default for SensorSnapshot {
    /// Baseline values the sensor bank starts from.
    fn default() -> Self {
        Self {
            temperature_c: 25.0,
            pressure_bar: 1.0,
            load_pct: 50.0,
            vibration: 1.5,
            humidity: 40.0,
            throughput: 100,
        }
    }
}

/// Coarse operational state a monitored machine obeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationalState {
    #[default]
    Running,
    Warning,
    Stopped,
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationalState::Running => write!(f, "RUNNING"),
            OperationalState::Warning => write!(f, "WARNING"),
            OperationalState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Externally visible view of the stress window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StressStatus {
    pub active: bool,
    pub seconds_left: u64,
}

/// Frame acquisition mode of the capture source manager, highest priority
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Stream,
    Snapshot,
    LocalDevice,
    Synthetic,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Stream => write!(f, "stream"),
            CaptureMode::Snapshot => write!(f, "snapshot"),
            CaptureMode::LocalDevice => write!(f, "local_device"),
            CaptureMode::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// An image-space point in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A single detected fiducial marker in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    pub id: i32,
    /// Corners in detection order (clockwise from top-left).
    pub corners: [Point2; 4],
}

impl MarkerObservation {
    pub fn new(id: i32, corners: [Point2; 4]) -> Self {
        Self { id, corners }
    }

    /// Sum of the four edge lengths in pixels.
    pub fn perimeter(&self) -> f64 {
        (0..4)
            .map(|i| self.corners[i].distance_to(&self.corners[(i + 1) % 4]))
            .sum()
    }
}

/// Pinhole camera intrinsics plus distortion coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// `k1, k2, p1, p2, k3`.
    pub distortion: [f64; 5],
}

impl Default for CameraIntrinsics {
    /// Fixed approximation used when no calibration is supplied.
    fn default() -> Self {
        Self {
            fx: 800.0,
            fy: 800.0,
            cx: 320.0,
            cy: 240.0,
            distortion: [0.0; 5],
        }
    }
}

impl CameraIntrinsics {
    /// The 3×3 camera matrix in row-major order.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }
}

/// Pose of one marker relative to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    /// Translation of the marker centre in metres (camera frame).
    pub translation: [f64; 3],
}

impl PoseEstimate {
    /// Euclidean camera→marker distance in metres.
    pub fn raw_distance(&self) -> f64 {
        let [x, y, z] = self.translation;
        (x * x + y * y + z * z).sqrt()
    }
}

/// Event wrapper carried on the safety alert bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"proxisafe-runtime::pipeline"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    StateTransition {
        from: OperationalState,
        to: OperationalState,
        risk: f64,
    },
    CaptureDemoted {
        from: CaptureMode,
        to: CaptureMode,
    },
    StressStarted {
        seconds: u64,
        intensity: f64,
    },
    StressCancelled,
    /// Periodic status record, serialised by the pipeline.
    Status(serde_json::Value),
}

/// Global error type spanning acquisition, pose recovery, encoding and
/// transport failures.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum SafetyError {
    #[error("Capture failure on {source_name}: {details}")]
    Capture { source_name: String, details: String },

    #[error("Pose estimation failed: {0}")]
    PoseEstimation(String),

    #[error("Frame encoding error: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_state_uses_upper_case_on_the_wire() {
        let json = serde_json::to_string(&OperationalState::Stopped).unwrap();
        assert_eq!(json, "\"STOPPED\"");
        let back: OperationalState = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(back, OperationalState::Running);
        assert_eq!(OperationalState::Warning.to_string(), "WARNING");
    }

    #[test]
    fn sensor_snapshot_keeps_legacy_field_names() {
        let json = serde_json::to_value(SensorSnapshot::default()).unwrap();
        assert_eq!(json["temperature_c"], 25.0);
        assert_eq!(json["pressure_bar"], 1.0);
        assert_eq!(json["load_pct"], 50.0);
        assert_eq!(json["throughput"], 100);
    }

    #[test]
    fn perimeter_of_axis_aligned_square() {
        let obs = MarkerObservation::new(
            7,
            [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ],
        );
        assert!((obs.perimeter() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn pose_raw_distance_is_translation_norm() {
        let pose = PoseEstimate {
            translation: [3.0, 0.0, 4.0],
        };
        assert!((pose.raw_distance() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn default_intrinsics_matrix() {
        let m = CameraIntrinsics::default().matrix();
        assert_eq!(m[0], [800.0, 0.0, 320.0]);
        assert_eq!(m[1], [0.0, 800.0, 240.0]);
        assert_eq!(m[2], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "proxisafe-runtime::pipeline",
            EventPayload::StateTransition {
                from: OperationalState::Running,
                to: OperationalState::Stopped,
                risk: 0.81,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert!(matches!(
            back.payload,
            EventPayload::StateTransition {
                to: OperationalState::Stopped,
                ..
            }
        ));
    }

    #[test]
    fn safety_error_display() {
        let err = SafetyError::Capture {
            source_name: "stream".to_string(),
            details: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("stream"));
        assert!(
            SafetyError::PoseEstimation("degenerate".into())
                .to_string()
                .contains("Pose estimation")
        );
    }
}
