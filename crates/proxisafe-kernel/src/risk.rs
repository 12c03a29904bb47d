//! Risk scoring.
//!
//! [`compute_risk`] is a pure weighted sum of six sub-scores, each clamped to
//! `[0, 1]` before weighting:
//!
//! | signal | normalisation | weight |
//! |---|---|---|
//! | temperature | `°C / 100` | 0.25 |
//! | pressure | `bar / 5` | 0.20 |
//! | load | `% / 120` | 0.15 |
//! | vibration | `/ 12` | 0.15 |
//! | humidity | `% / 80` | 0.10 |
//! | proximity | `1 − min(d / 2, 1)`, `0` when unknown | 0.15 |
//!
//! The weights sum to one, so the score itself lies in `[0, 1]`.  It is
//! rounded to three decimals.

use proxisafe_types::SensorSnapshot;
use serde::{Deserialize, Serialize};

/// Lower hysteresis threshold.
pub const RISK_WARNING: f64 = 0.50;
/// Upper hysteresis threshold.
pub const RISK_CRITICAL: f64 = 0.70;

const W_TEMPERATURE: f64 = 0.25;
const W_PRESSURE: f64 = 0.20;
const W_LOAD: f64 = 0.15;
const W_VIBRATION: f64 = 0.15;
const W_HUMIDITY: f64 = 0.10;
const W_PROXIMITY: f64 = 0.15;

/// Distance at and beyond which proximity contributes nothing, metres.
pub const PROXIMITY_RANGE_M: f64 = 2.0;

/// Fused risk score for `sensors` at marker `distance` (metres).
///
/// An unknown distance contributes no proximity risk.
///
/// ```rust
/// use proxisafe_kernel::risk::compute_risk;
/// use proxisafe_types::SensorSnapshot;
///
/// let baseline = SensorSnapshot::default();
/// assert_eq!(compute_risk(&baseline, None), compute_risk(&baseline, Some(2.0)));
/// assert!(compute_risk(&baseline, Some(0.1)) > compute_risk(&baseline, None));
/// ```
pub fn compute_risk(sensors: &SensorSnapshot, distance: Option<f64>) -> f64 {
    let risk = W_TEMPERATURE * unit(sensors.temperature_c / 100.0)
        + W_PRESSURE * unit(sensors.pressure_bar / 5.0)
        + W_LOAD * unit(sensors.load_pct / 120.0)
        + W_VIBRATION * unit(sensors.vibration / 12.0)
        + W_HUMIDITY * unit(sensors.humidity / 80.0)
        + W_PROXIMITY * proximity_score(distance);
    ((risk * 1000.0).round() / 1000.0).clamp(0.0, 1.0)
}

/// Proximity sub-score: `1` at the camera, `0` at [`PROXIMITY_RANGE_M`] or
/// when the distance is unknown.
pub fn proximity_score(distance: Option<f64>) -> f64 {
    match distance {
        Some(d) if !d.is_nan() => unit(1.0 - (d / PROXIMITY_RANGE_M).min(1.0)),
        _ => 0.0,
    }
}

/// Clamp to `[0, 1]`; NaN counts as no contribution.
fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Coarse classification of a risk score, used for overlays and advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Safe,
    Warning,
    Critical,
}

impl RiskBand {
    pub fn from_risk(risk: f64) -> Self {
        if risk >= RISK_CRITICAL {
            RiskBand::Critical
        } else if risk >= RISK_WARNING {
            RiskBand::Warning
        } else {
            RiskBand::Safe
        }
    }
}
