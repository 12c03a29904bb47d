//! Operator suggestions.

use crate::risk::RiskBand;

pub const TIP_NO_MARKER: &str = "Show ArUco marker to enable precise distance monitoring.";
pub const TIP_CRITICAL: &str = "CRITICAL: Auto-STOP engaged. Increase distance and lower load.";
pub const TIP_WARNING: &str = "WARNING: Reduce speed/load to lower temperature/pressure.";
pub const TIP_SAFE: &str = "SAFE: Conditions nominal.";

/// Tips for the current distance and risk, most specific first.
///
/// Always returns exactly one risk-band tip, preceded by a marker hint when
/// the distance is unknown.
pub fn suggestions(distance: Option<f64>, risk: f64) -> Vec<&'static str> {
    let mut tips = Vec::with_capacity(2);
    if distance.is_none() {
        tips.push(TIP_NO_MARKER);
    }
    tips.push(match RiskBand::from_risk(risk) {
        RiskBand::Critical => TIP_CRITICAL,
        RiskBand::Warning => TIP_WARNING,
        RiskBand::Safe => TIP_SAFE,
    });
    tips
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_with_marker() {
        assert_eq!(suggestions(Some(1.2), 0.2), vec![TIP_SAFE]);
    }

    #[test]
    fn missing_marker_is_mentioned_first() {
        assert_eq!(suggestions(None, 0.55), vec![TIP_NO_MARKER, TIP_WARNING]);
    }

    #[test]
    fn critical_band() {
        assert_eq!(suggestions(Some(0.3), 0.7), vec![TIP_CRITICAL]);
    }
}
