//! [`FramePipeline`] – the per-frame control loop.
//!
//! Each tick runs, in order:
//!
//! 1. **Capture** – ask the [`CaptureSourceManager`] for a frame.  No frame
//!    means the tick ends early ([`TickOutcome::NoFrame`]) without touching
//!    distance or state; the loop backs off briefly.
//! 2. **Distance** – detect markers and run the [`DistanceFilter`].  Without
//!    a usable marker and with a stress window active, the virtual distance
//!    stands in.
//! 3. **Presence** – optional annotation; failures are swallowed.
//! 4. **Decide** – read a sensor snapshot, compute risk, step the
//!    [`SafetyStateMachine`], and push any new state back to the telemetry
//!    source.
//! 5. **Publish** – draw the HUD, encode JPEG, and overwrite the
//!    [`ResultSlot`] in one go.
//!
//! State transitions, capture demotions and per-tick status records go out
//! on the [`EventBus`] when one is attached.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use proxisafe_hal::{CaptureConfig, CaptureSourceManager, SensorBank};
//! use proxisafe_runtime::{FramePipeline, PipelineConfig, ResultSlot, TickOutcome};
//!
//! let capture = CaptureSourceManager::synthetic(&CaptureConfig {
//!     synthetic_size: (160, 120),
//!     ..CaptureConfig::default()
//! });
//! let slot = ResultSlot::new();
//! let mut pipeline = FramePipeline::new(
//!     capture,
//!     Arc::new(SensorBank::with_seed(1)),
//!     slot.clone(),
//!     PipelineConfig::default(),
//! );
//!
//! assert!(matches!(pipeline.tick(), TickOutcome::Published { .. }));
//! assert!(slot.frame().is_some());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use proxisafe_hal::{CaptureSourceManager, TelemetrySource};
use proxisafe_kernel::{RiskBand, SafetyStateMachine, Transition, Watchdog, compute_risk};
use proxisafe_middleware::{EventBus, Topic};
use proxisafe_perception::{DistanceFilter, MarkerAdapter, NoMarkers, virtual_distance};
use proxisafe_types::{Event, EventPayload, OperationalState, SafetyError};
use serde_json::json;
use tracing::{debug, info, info_span, warn};

use crate::latest::{LatestResult, ResultSlot};
use crate::overlay::{DEFAULT_JPEG_QUALITY, Hud, draw_hud, encode_jpeg};
use crate::presence::{NoPresence, PresenceDetector};

/// Watchdog component name of the frame loop.
pub const PIPELINE_COMPONENT: &str = "pipeline";

const EVENT_SOURCE: &str = "proxisafe-runtime::pipeline";

// ────────────────────────────────────────────────────────────────────────────
// Configuration / outcome
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Target period of one published tick.
    pub tick: Duration,
    /// Pause after a tick that produced no frame.
    pub idle_backoff: Duration,
    pub jpeg_quality: u8,
    /// Heartbeat deadline registered with the watchdog.
    pub heartbeat_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(30),
            idle_backoff: Duration::from_millis(60),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            heartbeat_timeout: Duration::from_secs(5),
        }
    }
}

/// What one [`FramePipeline::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The capture source had nothing this tick.
    NoFrame,
    Published {
        distance: Option<f64>,
        risk: f64,
        state: OperationalState,
        transition: Option<Transition>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// FramePipeline
// ────────────────────────────────────────────────────────────────────────────

pub struct FramePipeline {
    capture: CaptureSourceManager,
    markers: Box<dyn MarkerAdapter>,
    presence: Box<dyn PresenceDetector>,
    filter: DistanceFilter,
    machine: SafetyStateMachine,
    telemetry: Arc<dyn TelemetrySource>,
    slot: ResultSlot,
    bus: Option<EventBus>,
    watchdog: Option<Arc<Watchdog>>,
    config: PipelineConfig,
    sequence: u64,
}

impl FramePipeline {
    /// A pipeline with no marker detector, no presence detector, a default
    /// distance filter and no bus or watchdog attached.
    pub fn new(
        capture: CaptureSourceManager,
        telemetry: Arc<dyn TelemetrySource>,
        slot: ResultSlot,
        config: PipelineConfig,
    ) -> Self {
        Self {
            capture,
            markers: Box::new(NoMarkers),
            presence: Box::new(NoPresence),
            filter: DistanceFilter::default(),
            machine: SafetyStateMachine::default(),
            telemetry,
            slot,
            bus: None,
            watchdog: None,
            config,
            sequence: 0,
        }
    }

    pub fn with_markers(mut self, adapter: Box<dyn MarkerAdapter>) -> Self {
        self.markers = adapter;
        self
    }

    pub fn with_presence(mut self, detector: Box<dyn PresenceDetector>) -> Self {
        self.presence = detector;
        self
    }

    pub fn with_filter(mut self, filter: DistanceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Attach a watchdog; registers [`PIPELINE_COMPONENT`] immediately.
    pub fn with_watchdog(mut self, watchdog: Arc<Watchdog>) -> Self {
        watchdog.register(PIPELINE_COMPONENT, self.config.heartbeat_timeout);
        self.watchdog = Some(watchdog);
        self
    }

    pub fn state(&self) -> OperationalState {
        self.machine.state()
    }

    /// Run one tick; see the module docs for the stage order.
    pub fn tick(&mut self) -> TickOutcome {
        let span = info_span!("pipeline.tick", seq = self.sequence);
        let _enter = span.enter();

        if let Some(watchdog) = &self.watchdog {
            watchdog.heartbeat(PIPELINE_COMPONENT);
        }

        let frame = self.capture.next_frame();
        if let Some(demotion) = self.capture.take_demotion() {
            self.emit(
                Topic::SafetyAlerts,
                EventPayload::CaptureDemoted {
                    from: demotion.from,
                    to: demotion.to,
                },
            );
        }
        let Some(mut frame) = frame else {
            return TickOutcome::NoFrame;
        };

        // Distance, with the virtual stand-in during stress.
        let observations = self.markers.detect(&frame);
        let estimate = self.filter.update(&observations, self.markers.as_ref());
        let mut distance = estimate.current;
        let mut is_virtual = false;
        if distance.is_none()
            && let Some(window) = self.telemetry.active_stress()
        {
            distance = Some(virtual_distance(
                window.elapsed_at(Instant::now()).as_secs_f64(),
            ));
            is_virtual = true;
        }
        let marker = estimate
            .selected_id
            .and(self.filter.select_observation(&observations));

        let presence = self.presence.detect(&frame).unwrap_or_else(|e| {
            debug!(error = %e, "presence detector failed");
            None
        });

        // Decide.
        let sensors = self.telemetry.snapshot();
        let risk = compute_risk(&sensors, distance);
        let transition = self.machine.evaluate(risk);
        if let Some(t) = transition {
            self.telemetry.set_operational_state(t.to);
            self.emit(
                Topic::SafetyAlerts,
                EventPayload::StateTransition {
                    from: t.from,
                    to: t.to,
                    risk: t.risk,
                },
            );
        }
        let state = self.machine.state();
        let capture_mode = self.capture.mode();

        // Publish.
        draw_hud(
            &mut frame,
            &Hud {
                distance,
                virtual_distance: is_virtual,
                risk,
                state,
                capture_mode,
                marker,
                presence,
            },
        );
        let jpeg = match encode_jpeg(&frame, self.config.jpeg_quality) {
            Ok(bytes) => Arc::new(bytes),
            Err(e) => {
                warn!(error = %e, "frame encoding failed, keeping previous frame");
                self.slot.frame().unwrap_or_default()
            }
        };
        self.slot.publish(LatestResult {
            jpeg,
            distance,
            virtual_distance: is_virtual,
            risk,
            state,
            capture_mode,
            sequence: self.sequence,
        });

        if self
            .bus
            .as_ref()
            .is_some_and(|bus| bus.receiver_count(Topic::Telemetry) > 0)
        {
            self.emit(
                Topic::Telemetry,
                EventPayload::Status(json!({
                    "sequence": self.sequence,
                    "distance_m": distance,
                    "virtual_distance": is_virtual,
                    "marker_id": estimate.selected_id,
                    "risk": risk,
                    "risk_band": RiskBand::from_risk(risk),
                    "system_state": state,
                    "capture_mode": capture_mode,
                })),
            );
        }

        self.sequence += 1;
        TickOutcome::Published {
            distance,
            risk,
            state,
            transition,
        }
    }

    /// Tick until `shutdown` is set, pacing to the configured tick period.
    /// Releases the capture source on exit.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!(
            mode = %self.capture.mode(),
            tick_ms = self.config.tick.as_millis() as u64,
            "frame pipeline started"
        );
        while !shutdown.load(Ordering::Relaxed) {
            let started = Instant::now();
            let pause = match self.tick() {
                TickOutcome::NoFrame => self.config.idle_backoff,
                TickOutcome::Published { .. } => self.config.tick.saturating_sub(started.elapsed()),
            };
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }
        self.capture.release();
        info!(ticks = self.sequence, "frame pipeline stopped");
    }

    /// Move the pipeline onto its own OS thread.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::Channel`] if the thread cannot be spawned.
    pub fn spawn(mut self, shutdown: Arc<AtomicBool>) -> Result<JoinHandle<()>, SafetyError> {
        thread::Builder::new()
            .name("frame-pipeline".into())
            .spawn(move || self.run(&shutdown))
            .map_err(|e| SafetyError::Channel(format!("spawning frame pipeline: {e}")))
    }

    fn emit(&self, topic: Topic, payload: EventPayload) {
        if let Some(bus) = &self.bus {
            bus.publish_to(topic, Event::new(EVENT_SOURCE, payload));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use proxisafe_hal::{CameraFrame, CaptureConfig, SensorBank, StressWindow};
    use proxisafe_kernel::ComponentHealth;
    use proxisafe_types::{
        CaptureMode, MarkerObservation, Point2, SensorSnapshot, StressStatus,
    };

    use crate::presence::PresenceBox;

    /// Telemetry source with fixed readings that records state feedback.
    struct FixedTelemetry {
        snapshot: Mutex<SensorSnapshot>,
        stress: Mutex<Option<StressWindow>>,
        states: Mutex<Vec<OperationalState>>,
    }

    impl FixedTelemetry {
        fn new(snapshot: SensorSnapshot) -> Arc<Self> {
            Arc::new(Self {
                snapshot: Mutex::new(snapshot),
                stress: Mutex::new(None),
                states: Mutex::new(Vec::new()),
            })
        }

        fn set(&self, snapshot: SensorSnapshot) {
            *self.snapshot.lock().unwrap() = snapshot;
        }
    }

    impl TelemetrySource for FixedTelemetry {
        fn snapshot(&self) -> SensorSnapshot {
            *self.snapshot.lock().unwrap()
        }

        fn set_operational_state(&self, state: OperationalState) {
            self.states.lock().unwrap().push(state);
        }

        fn trigger_stress(&self, seconds: u64, intensity: f64) -> StressWindow {
            let window = StressWindow::new(Instant::now(), seconds, intensity);
            *self.stress.lock().unwrap() = Some(window);
            window
        }

        fn cancel_stress(&self) {
            *self.stress.lock().unwrap() = None;
        }

        fn active_stress(&self) -> Option<StressWindow> {
            *self.stress.lock().unwrap()
        }
    }

    /// Always sees one centred marker `distance` metres away.
    struct FixedMarker {
        distance: f64,
    }

    impl MarkerAdapter for FixedMarker {
        fn detect(&self, _frame: &CameraFrame) -> Vec<MarkerObservation> {
            let h = 800.0 * 0.05 / self.distance / 2.0;
            vec![MarkerObservation::new(
                7,
                [
                    Point2::new(320.0 - h, 240.0 - h),
                    Point2::new(320.0 + h, 240.0 - h),
                    Point2::new(320.0 + h, 240.0 + h),
                    Point2::new(320.0 - h, 240.0 + h),
                ],
            )]
        }
    }

    struct FailingPresence;

    impl PresenceDetector for FailingPresence {
        fn detect(&self, _frame: &CameraFrame) -> Result<Option<PresenceBox>, SafetyError> {
            Err(SafetyError::PoseEstimation("cascade unavailable".into()))
        }
    }

    fn calm() -> SensorSnapshot {
        SensorSnapshot {
            temperature_c: 20.0,
            pressure_bar: 1.0,
            load_pct: 30.0,
            vibration: 1.0,
            humidity: 40.0,
            throughput: 100,
        }
    }

    fn hot() -> SensorSnapshot {
        SensorSnapshot {
            temperature_c: 100.0,
            pressure_bar: 5.0,
            load_pct: 120.0,
            vibration: 12.0,
            humidity: 80.0,
            throughput: 100,
        }
    }

    fn pipeline(telemetry: Arc<dyn TelemetrySource>, slot: ResultSlot) -> FramePipeline {
        let capture = CaptureSourceManager::synthetic(&CaptureConfig {
            synthetic_size: (96, 64),
            ..CaptureConfig::default()
        });
        FramePipeline::new(capture, telemetry, slot, PipelineConfig::default())
    }

    #[test]
    fn publishes_frame_and_decision() {
        let slot = ResultSlot::new();
        let telemetry = FixedTelemetry::new(calm());
        let mut p = pipeline(telemetry, slot.clone())
            .with_markers(Box::new(FixedMarker { distance: 1.0 }));

        let TickOutcome::Published {
            distance, state, ..
        } = p.tick()
        else {
            panic!("synthetic capture must produce a frame");
        };
        assert!((distance.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(state, OperationalState::Running);

        let latest = slot.latest().unwrap();
        assert_eq!(&latest.jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(latest.capture_mode, CaptureMode::Synthetic);
        assert!(!latest.virtual_distance);
        assert_eq!(latest.sequence, 0);
    }

    #[test]
    fn no_marker_and_no_stress_means_unknown_distance() {
        let slot = ResultSlot::new();
        let mut p = pipeline(FixedTelemetry::new(calm()), slot.clone());
        let TickOutcome::Published { distance, .. } = p.tick() else {
            panic!("expected a frame");
        };
        assert_eq!(distance, None);
        assert_eq!(slot.distance(), None);
    }

    #[test]
    fn stress_without_marker_uses_virtual_distance() {
        let slot = ResultSlot::new();
        let telemetry = FixedTelemetry::new(calm());
        telemetry.trigger_stress(30, 0.9);
        let mut p = pipeline(telemetry, slot.clone());

        let TickOutcome::Published { distance, .. } = p.tick() else {
            panic!("expected a frame");
        };
        let d = distance.unwrap();
        assert!((1.5..=1.65).contains(&d), "fresh stress starts near 1.6 m, got {d}");
        assert!(slot.latest().unwrap().virtual_distance);
    }

    #[test]
    fn real_marker_bypasses_virtual_distance() {
        let telemetry = FixedTelemetry::new(calm());
        telemetry.trigger_stress(30, 0.9);
        let mut p = pipeline(telemetry, ResultSlot::new())
            .with_markers(Box::new(FixedMarker { distance: 0.8 }));
        let TickOutcome::Published { distance, .. } = p.tick() else {
            panic!("expected a frame");
        };
        assert!((distance.unwrap() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn transitions_are_fed_back_and_broadcast() {
        let telemetry = FixedTelemetry::new(calm());
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::SafetyAlerts);
        let mut p = pipeline(telemetry.clone(), ResultSlot::new()).with_bus(bus);

        assert!(matches!(
            p.tick(),
            TickOutcome::Published { transition: None, .. }
        ));

        telemetry.set(hot());
        let TickOutcome::Published {
            state, transition, ..
        } = p.tick()
        else {
            panic!("expected a frame");
        };
        assert_eq!(state, OperationalState::Stopped);
        assert_eq!(transition.map(|t| t.to), Some(OperationalState::Stopped));
        assert_eq!(*telemetry.states.lock().unwrap(), vec![OperationalState::Stopped]);

        let event = alerts.next_event_now().expect("transition event");
        assert!(matches!(
            event.payload,
            EventPayload::StateTransition {
                to: OperationalState::Stopped,
                ..
            }
        ));

        telemetry.set(calm());
        p.tick();
        assert_eq!(p.state(), OperationalState::Running);
        assert_eq!(telemetry.states.lock().unwrap().len(), 2);
    }

    #[test]
    fn presence_failure_is_swallowed() {
        let mut p = pipeline(FixedTelemetry::new(calm()), ResultSlot::new())
            .with_presence(Box::new(FailingPresence));
        assert!(matches!(p.tick(), TickOutcome::Published { .. }));
    }

    #[test]
    fn status_records_go_to_telemetry_subscribers() {
        let bus = EventBus::default();
        let mut status = bus.subscribe_to(Topic::Telemetry);
        let mut p = pipeline(FixedTelemetry::new(calm()), ResultSlot::new()).with_bus(bus);
        p.tick();

        let event = status.next_event_now().expect("status record");
        let EventPayload::Status(record) = event.payload else {
            panic!("expected a status payload");
        };
        assert_eq!(record["system_state"], "RUNNING");
        assert_eq!(record["capture_mode"], "synthetic");
        assert!(record["distance_m"].is_null());
    }

    #[test]
    fn ticks_heartbeat_the_watchdog() {
        let watchdog = Arc::new(Watchdog::new());
        let mut p = pipeline(FixedTelemetry::new(calm()), ResultSlot::new())
            .with_watchdog(Arc::clone(&watchdog));
        p.tick();
        assert_eq!(watchdog.health(PIPELINE_COMPONENT), ComponentHealth::Healthy);
    }

    #[test]
    fn sensor_bank_plugs_in_as_telemetry() {
        let bank = Arc::new(SensorBank::with_seed(3));
        let mut p = pipeline(bank.clone(), ResultSlot::new());
        p.tick();
        assert_eq!(bank.stress_status(), StressStatus::default());
    }

    #[test]
    fn spawned_pipeline_stops_on_shutdown() {
        let slot = ResultSlot::new();
        let p = pipeline(FixedTelemetry::new(calm()), slot.clone());
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = p.spawn(Arc::clone(&shutdown)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while slot.latest().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
        assert!(slot.latest().is_some());
    }
}
