//! [`Watchdog`] – liveness tracking for the background loops.
//!
//! The frame pipeline and the sensor task each register a deadline and call
//! [`Watchdog::heartbeat`] once per iteration.  The transport layer reads
//! [`Watchdog::report`] to show operators whether the loops are still
//! turning.  The watchdog is shared by reference (`Arc<Watchdog>`); all
//! methods take `&self`.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentHealth {
    Healthy,
    /// No heartbeat within the registered deadline.
    TimedOut,
}

// ────────────────────────────────────────────────────────────────────────────
// Internal entry
// ────────────────────────────────────────────────────────────────────────────

struct Deadline {
    last_beat: Instant,
    timeout: Duration,
    /// Whether the timeout has already been logged.
    reported: bool,
}

impl Deadline {
    fn health_at(&self, now: Instant) -> ComponentHealth {
        if now.saturating_duration_since(self.last_beat) <= self.timeout {
            ComponentHealth::Healthy
        } else {
            ComponentHealth::TimedOut
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Watchdog
// ────────────────────────────────────────────────────────────────────────────

/// Heartbeat registry keyed by component name.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use proxisafe_kernel::watchdog::{ComponentHealth, Watchdog};
///
/// let wd = Watchdog::new();
/// wd.register("pipeline", Duration::from_secs(2));
/// wd.heartbeat("pipeline");
/// assert_eq!(wd.health("pipeline"), ComponentHealth::Healthy);
/// assert_eq!(wd.health("camera"), ComponentHealth::TimedOut);
/// ```
#[derive(Default)]
pub struct Watchdog {
    components: Mutex<BTreeMap<String, Deadline>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` with a heartbeat deadline; the clock starts now.
    /// Registering again replaces the deadline.
    pub fn register(&self, component: &str, timeout: Duration) {
        self.lock().insert(
            component.to_string(),
            Deadline {
                last_beat: Instant::now(),
                timeout,
                reported: false,
            },
        );
    }

    /// Record a heartbeat. Unknown components are ignored.
    pub fn heartbeat(&self, component: &str) {
        if let Some(entry) = self.lock().get_mut(component) {
            entry.last_beat = Instant::now();
            entry.reported = false;
        }
    }

    /// Health of one component; unknown components count as timed out.
    pub fn health(&self, component: &str) -> ComponentHealth {
        let now = Instant::now();
        self.lock()
            .get(component)
            .map_or(ComponentHealth::TimedOut, |e| e.health_at(now))
    }

    /// Names of all components past their deadline, in name order.
    ///
    /// Each component is logged once per outage.
    pub fn check_all(&self) -> Vec<String> {
        let now = Instant::now();
        let mut components = self.lock();
        components
            .iter_mut()
            .filter(|(_, e)| e.health_at(now) == ComponentHealth::TimedOut)
            .map(|(name, e)| {
                if !e.reported {
                    e.reported = true;
                    warn!(
                        component = %name,
                        silent_ms = now.saturating_duration_since(e.last_beat).as_millis() as u64,
                        "watchdog: component missed its deadline"
                    );
                }
                name.clone()
            })
            .collect()
    }

    /// Health of every registered component, in name order.
    pub fn report(&self) -> BTreeMap<String, ComponentHealth> {
        let now = Instant::now();
        self.lock()
            .iter()
            .map(|(name, e)| (name.clone(), e.health_at(now)))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Deadline>> {
        self.components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn registered_component_starts_healthy() {
        let wd = Watchdog::new();
        wd.register("pipeline", Duration::from_secs(5));
        assert_eq!(wd.health("pipeline"), ComponentHealth::Healthy);
        assert!(wd.check_all().is_empty());
    }

    #[test]
    fn silence_past_deadline_times_out() {
        let wd = Watchdog::new();
        wd.register("sensors", Duration::from_millis(20));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(wd.health("sensors"), ComponentHealth::TimedOut);
        assert_eq!(wd.check_all(), vec!["sensors".to_string()]);

        wd.heartbeat("sensors");
        assert_eq!(wd.health("sensors"), ComponentHealth::Healthy);
    }

    #[test]
    fn report_lists_every_component_sorted() {
        let wd = Watchdog::new();
        wd.register("sensors", Duration::from_secs(60));
        wd.register("pipeline", Duration::from_millis(1));
        thread::sleep(Duration::from_millis(10));
        let report: Vec<_> = wd.report().into_iter().collect();
        assert_eq!(
            report,
            vec![
                ("pipeline".to_string(), ComponentHealth::TimedOut),
                ("sensors".to_string(), ComponentHealth::Healthy),
            ]
        );
    }

    #[test]
    fn heartbeats_from_other_threads_are_seen() {
        let wd = Arc::new(Watchdog::new());
        wd.register("pipeline", Duration::from_millis(50));
        let beater = {
            let wd = Arc::clone(&wd);
            thread::spawn(move || {
                for _ in 0..10 {
                    wd.heartbeat("pipeline");
                    thread::sleep(Duration::from_millis(10));
                }
            })
        };
        beater.join().unwrap();
        assert_eq!(wd.health("pipeline"), ComponentHealth::Healthy);
    }

    #[test]
    fn unknown_components() {
        let wd = Watchdog::new();
        wd.heartbeat("ghost");
        assert_eq!(wd.health("ghost"), ComponentHealth::TimedOut);
        assert!(wd.report().is_empty());
    }

    #[test]
    fn health_serializes_snake_case() {
        let json = serde_json::to_string(&ComponentHealth::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
    }
}
