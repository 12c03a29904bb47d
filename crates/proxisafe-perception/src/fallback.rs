//! Virtual distance used while a stress window runs without a visible marker.
//!
//! The synthetic target approaches from 1.6 m to 0.6 m over eight seconds
//! with a ±5 cm wobble, never closer than [`VIRTUAL_MIN_DISTANCE_M`].

/// Start of the virtual approach, metres.
pub const VIRTUAL_START_M: f64 = 1.6;
/// How far the approach travels, metres.
pub const VIRTUAL_TRAVEL_M: f64 = 1.0;
/// Seconds until the approach reaches its end point.
pub const VIRTUAL_RAMP_SECS: f64 = 8.0;
pub const VIRTUAL_MIN_DISTANCE_M: f64 = 0.45;

/// Virtual distance `elapsed_secs` after the stress window started.
///
/// ```rust
/// use proxisafe_perception::fallback::virtual_distance;
///
/// assert!((virtual_distance(0.0) - 1.6).abs() < 1e-12);
/// assert!(virtual_distance(30.0) >= 0.45);
/// ```
pub fn virtual_distance(elapsed_secs: f64) -> f64 {
    let elapsed = if elapsed_secs.is_finite() {
        elapsed_secs.max(0.0)
    } else {
        0.0
    };
    let squeeze = (elapsed / VIRTUAL_RAMP_SECS).min(1.0);
    let base = VIRTUAL_START_M - VIRTUAL_TRAVEL_M * squeeze;
    let wobble = 0.05 * (3.0 * elapsed).sin();
    (base + wobble).max(VIRTUAL_MIN_DISTANCE_M)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approaches_over_eight_seconds() {
        let start = virtual_distance(0.0);
        let mid = virtual_distance(4.0);
        let end = virtual_distance(8.0);
        assert!((start - 1.6).abs() < 1e-12);
        assert!((mid - (1.1 + 0.05 * 12.0_f64.sin())).abs() < 1e-12);
        assert!((end - (0.6 + 0.05 * 24.0_f64.sin())).abs() < 1e-12);
    }

    #[test]
    fn never_closer_than_floor() {
        for i in 0..2_000 {
            let d = virtual_distance(i as f64 * 0.05);
            assert!(d >= VIRTUAL_MIN_DISTANCE_M);
            assert!(d <= VIRTUAL_START_M + 0.05);
        }
    }

    #[test]
    fn negative_or_nan_elapsed_is_treated_as_zero() {
        assert_eq!(virtual_distance(-3.0), virtual_distance(0.0));
        assert_eq!(virtual_distance(f64::NAN), virtual_distance(0.0));
    }
}
