//! Simulated environmental sensor bank.
//!
//! [`SensorBank`] is a mock telemetry source: it drifts temperature,
//! pressure, load, vibration and humidity around load-driven targets, reacts
//! to an injected stress window, and eases values down while the monitored
//! machine is stopped.  Call [`SensorBank::step`] on a fixed cadence.
//!
//! # Example
//!
//! ```rust
//! use proxisafe_hal::sensors::{SensorBank, TelemetrySource};
//!
//! let bank = SensorBank::with_seed(7);
//! bank.trigger_stress(10, 0.9);
//! assert!(bank.stress_status().active);
//!
//! bank.step();
//! let snapshot = bank.snapshot();
//! assert!(snapshot.load_pct <= 120.0);
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use proxisafe_types::{OperationalState, SensorSnapshot, StressStatus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shortest stress window accepted by [`TelemetrySource::trigger_stress`].
pub const MIN_STRESS_SECONDS: u64 = 5;
/// Longest stress window; longer requests are cut to one day.
pub const MAX_STRESS_SECONDS: u64 = 24 * 60 * 60;
pub const MIN_STRESS_INTENSITY: f64 = 0.2;
pub const MAX_STRESS_INTENSITY: f64 = 1.0;

/// A time-bounded stress injection.
///
/// Activity is derived from `until`; there is no separate flag that could
/// disagree with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressWindow {
    pub started_at: Instant,
    pub until: Instant,
    /// Always within `[MIN_STRESS_INTENSITY, MAX_STRESS_INTENSITY]`.
    pub intensity: f64,
}

impl StressWindow {
    /// `seconds` is clamped to `[MIN_STRESS_SECONDS, MAX_STRESS_SECONDS]`.
    pub fn new(started_at: Instant, seconds: u64, intensity: f64) -> Self {
        let length = Duration::from_secs(seconds.clamp(MIN_STRESS_SECONDS, MAX_STRESS_SECONDS));
        Self {
            started_at,
            until: started_at.checked_add(length).unwrap_or(started_at),
            intensity: clamp_intensity(intensity),
        }
    }

    pub fn is_active_at(&self, now: Instant) -> bool {
        now < self.until
    }

    /// Whole seconds remaining, rounded up; `0` once expired.
    pub fn seconds_left_at(&self, now: Instant) -> u64 {
        self.until
            .saturating_duration_since(now)
            .as_secs_f64()
            .ceil() as u64
    }

    /// Time since the window was triggered.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

/// Clamp a requested stress intensity into the accepted range. Non-finite
/// input maps to the maximum.
pub fn clamp_intensity(intensity: f64) -> f64 {
    if intensity.is_finite() {
        intensity.clamp(MIN_STRESS_INTENSITY, MAX_STRESS_INTENSITY)
    } else {
        MAX_STRESS_INTENSITY
    }
}

/// Fixed contract every telemetry source implements.
pub trait TelemetrySource: Send + Sync {
    /// Copy of the latest readings.
    fn snapshot(&self) -> SensorSnapshot;

    /// Feed back the monitor's operational state.
    fn set_operational_state(&self, state: OperationalState);

    /// Open (or replace) a stress window; returns the window now in force.
    fn trigger_stress(&self, seconds: u64, intensity: f64) -> StressWindow;

    fn cancel_stress(&self);

    /// The stress window, only while it is active.
    fn active_stress(&self) -> Option<StressWindow>;

    fn stress_status(&self) -> StressStatus {
        let now = Instant::now();
        match self.active_stress() {
            Some(window) => StressStatus {
                active: window.is_active_at(now),
                seconds_left: window.seconds_left_at(now),
            },
            None => StressStatus::default(),
        }
    }
}

struct BankState {
    data: SensorSnapshot,
    state: OperationalState,
    stress: Option<StressWindow>,
    rng: StdRng,
}

/// Simulated sensor bank; see the module docs.
pub struct SensorBank {
    inner: Mutex<BankState>,
    started: Instant,
}

impl SensorBank {
    /// A bank seeded from the operating system's entropy source.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// A reproducible bank for tests and demos.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            inner: Mutex::new(BankState {
                data: SensorSnapshot::default(),
                state: OperationalState::Running,
                stress: None,
                rng,
            }),
            started: Instant::now(),
        }
    }

    /// Current operational state as last reported to the bank.
    pub fn operational_state(&self) -> OperationalState {
        self.lock().state
    }

    /// Advance the simulation by one update.
    pub fn step(&self) {
        let t = self.started.elapsed().as_secs_f64();
        let now = Instant::now();
        let mut guard = self.lock();
        let s = &mut *guard;

        let k = match s.stress {
            Some(w) if w.is_active_at(now) => w.intensity,
            _ => 0.0,
        };

        let load_wave = 50.0 + 20.0 * (2.0 * std::f64::consts::PI * t / 18.0).sin();
        let load = load_wave + 35.0 * k + s.rng.random_range(-6.0..6.0);
        s.data.load_pct = load.clamp(0.0, 120.0);
        let load_frac = s.data.load_pct / 120.0;

        let mut temp_target = 28.0 + load_frac * 70.0 + 8.0 * k;
        let mut press_target = 1.1 + load_frac * 3.6 + 0.4 * k;
        let mut vib_target =
            1.8 + (s.data.load_pct / 100.0) * 6.0 + (press_target - 1.1) * 0.5 + 1.2 * k;

        if s.rng.random_bool(0.03 + 0.05 * k) {
            vib_target += s.rng.random_range(0.8..1.8);
        }
        if s.rng.random_bool(0.02 + 0.03 * k) {
            temp_target += s.rng.random_range(2.0..5.0);
        }
        if s.rng.random_bool(0.02 + 0.03 * k) {
            press_target += s.rng.random_range(0.15..0.45);
        }

        if s.state == OperationalState::Stopped {
            temp_target -= 0.5;
            press_target -= 0.05;
            vib_target -= 0.1;
            s.data.throughput = s.data.throughput.saturating_sub(5);
        } else {
            let delta: i64 = s.rng.random_range(-2..=5);
            s.data.throughput = (s.data.throughput as i64 + delta).clamp(0, 300) as u32;
        }

        s.data.temperature_c += (temp_target - s.data.temperature_c) * 0.1;
        s.data.pressure_bar += (press_target - s.data.pressure_bar) * 0.1;
        s.data.vibration += (vib_target - s.data.vibration) * 0.1;
        s.data.humidity =
            (40.0 + 5.0 * (t / 30.0).sin() + s.rng.random_range(-2.0..2.0)).clamp(20.0, 80.0);
    }

    fn lock(&self) -> MutexGuard<'_, BankState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SensorBank {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for SensorBank {
    fn snapshot(&self) -> SensorSnapshot {
        self.lock().data
    }

    fn set_operational_state(&self, state: OperationalState) {
        self.lock().state = state;
    }

    fn trigger_stress(&self, seconds: u64, intensity: f64) -> StressWindow {
        let window = StressWindow::new(Instant::now(), seconds, intensity);
        self.lock().stress = Some(window);
        window
    }

    fn cancel_stress(&self) {
        self.lock().stress = None;
    }

    fn active_stress(&self) -> Option<StressWindow> {
        let now = Instant::now();
        self.lock().stress.filter(|w| w.is_active_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_from_baseline() {
        let bank = SensorBank::with_seed(1);
        assert_eq!(bank.snapshot(), SensorSnapshot::default());
        assert_eq!(bank.operational_state(), OperationalState::Running);
        assert!(!bank.stress_status().active);
    }

    #[test]
    fn fresh_stress_window_reports_full_duration() {
        let bank = SensorBank::with_seed(1);
        bank.trigger_stress(5, 0.9);
        let status = bank.stress_status();
        assert!(status.active);
        assert!(status.seconds_left > 0 && status.seconds_left <= 5);
    }

    #[test]
    fn huge_stress_request_is_capped_to_a_day() {
        let bank = SensorBank::with_seed(1);
        let window = bank.trigger_stress(u64::MAX, 0.9);
        assert_eq!(
            window.until.duration_since(window.started_at),
            Duration::from_secs(MAX_STRESS_SECONDS)
        );
        let status = bank.stress_status();
        assert!(status.active);
        assert!(status.seconds_left <= MAX_STRESS_SECONDS);
    }

    #[test]
    fn stress_window_expires_by_wall_clock() {
        let start = Instant::now();
        let window = StressWindow::new(start, 5, 0.9);
        assert!(window.is_active_at(start + Duration::from_millis(4_900)));
        assert!(!window.is_active_at(start + Duration::from_secs(5)));
        assert_eq!(window.seconds_left_at(start + Duration::from_secs(6)), 0);
        assert_eq!(window.seconds_left_at(start + Duration::from_millis(500)), 5);
        assert_eq!(
            window.elapsed_at(start + Duration::from_secs(3)),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn stress_parameters_are_clamped() {
        let window = StressWindow::new(Instant::now(), 1, 7.0);
        assert_eq!(window.intensity, MAX_STRESS_INTENSITY);
        assert_eq!(window.until - window.started_at, Duration::from_secs(5));
        assert_eq!(clamp_intensity(0.01), MIN_STRESS_INTENSITY);
        assert_eq!(clamp_intensity(f64::NAN), MAX_STRESS_INTENSITY);
        assert_eq!(clamp_intensity(0.5), 0.5);
    }

    #[test]
    fn cancel_clears_window() {
        let bank = SensorBank::with_seed(1);
        bank.trigger_stress(30, 0.5);
        assert!(bank.active_stress().is_some());
        bank.cancel_stress();
        assert!(bank.active_stress().is_none());
        assert_eq!(bank.stress_status(), StressStatus::default());
    }

    #[test]
    fn step_keeps_readings_in_range() {
        let bank = SensorBank::with_seed(42);
        bank.trigger_stress(60, 1.0);
        for _ in 0..500 {
            bank.step();
            let s = bank.snapshot();
            assert!((0.0..=120.0).contains(&s.load_pct));
            assert!((20.0..=80.0).contains(&s.humidity));
            assert!(s.throughput <= 300);
            assert!(s.temperature_c.is_finite() && s.pressure_bar.is_finite());
        }
    }

    #[test]
    fn stress_raises_load_and_temperature() {
        let calm = SensorBank::with_seed(3);
        let stressed = SensorBank::with_seed(3);
        stressed.trigger_stress(60, 1.0);
        for _ in 0..60 {
            calm.step();
            stressed.step();
        }
        assert!(stressed.snapshot().load_pct > calm.snapshot().load_pct);
        assert!(stressed.snapshot().temperature_c > calm.snapshot().temperature_c);
    }

    #[test]
    fn stopped_state_drains_throughput() {
        let bank = SensorBank::with_seed(9);
        bank.set_operational_state(OperationalState::Stopped);
        let before = bank.snapshot().throughput;
        bank.step();
        assert_eq!(bank.snapshot().throughput, before - 5);
    }

    #[test]
    fn concurrent_readers_see_consistent_snapshots() {
        let bank = std::sync::Arc::new(SensorBank::with_seed(5));
        let writer = {
            let bank = std::sync::Arc::clone(&bank);
            thread::spawn(move || {
                for _ in 0..200 {
                    bank.step();
                }
            })
        };
        for _ in 0..200 {
            let s = bank.snapshot();
            assert!((0.0..=120.0).contains(&s.load_pct));
        }
        writer.join().unwrap();
    }
}
