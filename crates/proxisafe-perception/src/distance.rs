//! Temporal distance filter.
//!
//! [`DistanceFilter`] converts noisy per-frame marker observations into a
//! stable camera→marker distance:
//!
//! 1. **Selection** – the first observation whose id equals the configured
//!    target, otherwise the one with the largest image-space perimeter.
//! 2. **Outlier suppression** – median of the last three raw distances.
//! 3. **Exponential smoothing** – `ema = α·median + (1 − α)·ema_prev`, seeded
//!    with the first median.  `α = 0` turns smoothing off (pure median).
//!
//! Frames without a usable observation do not touch the median buffer or the
//! EMA.  The smoothing state survives up to `stale_frames` such frames in a
//! row; past that the filter resets itself so a marker that reappears much
//! later starts from a clean slate.
//!
//! # Example
//!
//! ```rust
//! use proxisafe_perception::distance::{DistanceFilter, DistanceFilterConfig};
//!
//! let mut filter = DistanceFilter::new(DistanceFilterConfig {
//!     alpha: 0.0,
//!     ..DistanceFilterConfig::default()
//! });
//! filter.observe(1.0);
//! filter.observe(1.0);
//! // The spike is voted out by the median.
//! assert_eq!(filter.observe(5.0), 1.0);
//! ```

use std::collections::VecDeque;

use proxisafe_types::{CameraIntrinsics, MarkerObservation};
use tracing::debug;

use crate::marker::MarkerAdapter;

pub const DEFAULT_ALPHA: f64 = 0.35;
/// Physical side length of the default printed marker (5 cm).
pub const DEFAULT_MARKER_SIZE_M: f64 = 0.05;
pub const DEFAULT_STALE_FRAMES: u32 = 30;

const MEDIAN_WINDOW: usize = 3;

// ────────────────────────────────────────────────────────────────────────────
// Configuration / output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceFilterConfig {
    /// EMA weight of the newest median, clamped to `[0, 1]`.
    pub alpha: f64,
    /// Marker side length in metres.
    pub marker_size: f64,
    /// Preferred marker id; `None` tracks the largest marker in view.
    pub target_id: Option<i32>,
    pub intrinsics: CameraIntrinsics,
    /// Consecutive marker-less frames tolerated before the filter resets.
    pub stale_frames: u32,
}

impl Default for DistanceFilterConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            marker_size: DEFAULT_MARKER_SIZE_M,
            target_id: None,
            intrinsics: CameraIntrinsics::default(),
            stale_frames: DEFAULT_STALE_FRAMES,
        }
    }
}

/// Result of one [`DistanceFilter::update`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistanceEstimate {
    /// Filtered distance for this frame; `None` when the frame had no usable
    /// observation.
    pub current: Option<f64>,
    /// Latest filtered distance still held by the filter.
    pub smoothed: Option<f64>,
    /// Id of the marker that produced `current`.
    pub selected_id: Option<i32>,
}

// ────────────────────────────────────────────────────────────────────────────
// DistanceFilter
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DistanceFilter {
    config: DistanceFilterConfig,
    recent: VecDeque<f64>,
    ema: Option<f64>,
    last_output: Option<f64>,
    missed_frames: u32,
}

impl DistanceFilter {
    pub fn new(mut config: DistanceFilterConfig) -> Self {
        config.alpha = sanitize_alpha(config.alpha);
        Self {
            config,
            recent: VecDeque::with_capacity(MEDIAN_WINDOW),
            ema: None,
            last_output: None,
            missed_frames: 0,
        }
    }

    pub fn config(&self) -> &DistanceFilterConfig {
        &self.config
    }

    /// Latest filtered distance, if any.
    pub fn smoothed(&self) -> Option<f64> {
        self.last_output
    }

    /// Process one frame's observations.
    ///
    /// Pose failures are logged and treated like an empty frame; they never
    /// propagate.
    pub fn update(
        &mut self,
        observations: &[MarkerObservation],
        adapter: &dyn MarkerAdapter,
    ) -> DistanceEstimate {
        let raw = self.select_observation(observations).and_then(|obs| {
            match adapter.estimate_pose(&obs.corners, self.config.marker_size, &self.config.intrinsics)
            {
                Ok(pose) if pose.raw_distance().is_finite() => Some((obs.id, pose.raw_distance())),
                Ok(pose) => {
                    debug!(id = obs.id, ?pose, "distance: non-finite pose ignored");
                    None
                }
                Err(e) => {
                    debug!(id = obs.id, error = %e, "distance: pose recovery failed");
                    None
                }
            }
        });

        match raw {
            Some((id, raw)) => {
                let value = self.observe(raw);
                DistanceEstimate {
                    current: Some(value),
                    smoothed: Some(value),
                    selected_id: Some(id),
                }
            }
            None => {
                self.miss();
                DistanceEstimate {
                    current: None,
                    smoothed: self.last_output,
                    selected_id: None,
                }
            }
        }
    }

    /// Feed one raw distance through median and EMA; returns the output.
    pub fn observe(&mut self, raw: f64) -> f64 {
        if self.recent.len() == MEDIAN_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(raw);
        let median = median(&self.recent);

        let output = if self.config.alpha > 0.0 {
            let alpha = self.config.alpha;
            let ema = match self.ema {
                Some(prev) => alpha * median + (1.0 - alpha) * prev,
                None => median,
            };
            self.ema = Some(ema);
            ema
        } else {
            median
        };
        self.last_output = Some(output);
        self.missed_frames = 0;
        output
    }

    /// Pick the observation to track this frame.
    pub fn select_observation<'a>(
        &self,
        observations: &'a [MarkerObservation],
    ) -> Option<&'a MarkerObservation> {
        if let Some(target) = self.config.target_id
            && let Some(hit) = observations.iter().find(|o| o.id == target)
        {
            return Some(hit);
        }
        observations
            .iter()
            .max_by(|a, b| a.perimeter().total_cmp(&b.perimeter()))
    }

    /// Clear the median buffer and the EMA.
    pub fn reset(&mut self) {
        self.recent.clear();
        self.ema = None;
        self.last_output = None;
        self.missed_frames = 0;
    }

    /// Change the physical marker size; resets the filter.
    pub fn set_marker_size(&mut self, meters: f64) {
        self.config.marker_size = meters;
        self.reset();
    }

    /// Change the camera intrinsics; resets the filter.
    pub fn set_intrinsics(&mut self, intrinsics: CameraIntrinsics) {
        self.config.intrinsics = intrinsics;
        self.reset();
    }

    fn miss(&mut self) {
        if self.last_output.is_none() {
            return;
        }
        self.missed_frames += 1;
        if self.missed_frames > self.config.stale_frames {
            debug!(
                missed = self.missed_frames,
                "distance: marker lost, discarding smoothing state"
            );
            self.reset();
        }
    }
}

impl Default for DistanceFilter {
    fn default() -> Self {
        Self::new(DistanceFilterConfig::default())
    }
}

fn sanitize_alpha(alpha: f64) -> f64 {
    if alpha.is_finite() {
        alpha.clamp(0.0, 1.0)
    } else {
        DEFAULT_ALPHA
    }
}

fn median(values: &VecDeque<f64>) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().collect();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
