//! Async background tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use proxisafe_hal::{SensorBank, TelemetrySource};
use proxisafe_kernel::Watchdog;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// Watchdog component name of the sensor updater.
pub const SENSOR_COMPONENT: &str = "sensors";

/// Step `bank` every `period` until `shutdown` is set.
///
/// When a watchdog is supplied the task registers itself with a deadline of
/// three periods and heartbeats after every step.
pub async fn run_sensor_task(
    bank: Arc<SensorBank>,
    period: Duration,
    watchdog: Option<Arc<Watchdog>>,
    shutdown: Arc<AtomicBool>,
) {
    let period = period.max(Duration::from_millis(10));
    if let Some(wd) = &watchdog {
        wd.register(SENSOR_COMPONENT, period * 3);
    }
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_ms = period.as_millis() as u64, "sensor task started");

    let mut steps: u64 = 0;
    while !shutdown.load(Ordering::Relaxed) {
        ticker.tick().await;
        bank.step();
        steps += 1;
        if let Some(wd) = &watchdog {
            wd.heartbeat(SENSOR_COMPONENT);
        }
        if steps % 60 == 0 {
            debug!(steps, snapshot = ?bank.snapshot(), "sensor task alive");
        }
    }
    info!(steps, "sensor task stopped");
}
