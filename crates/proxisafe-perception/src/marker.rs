//! Marker observation boundary.
//!
//! Fiducial detection is delegated to whatever vision primitive the host
//! provides.  A [`MarkerAdapter`] returns the candidate markers in a frame
//! and recovers a pose for one of them; the default
//! [`MarkerAdapter::estimate_pose`] uses [`pinhole_pose`].
//!
//! # Example
//!
//! ```rust
//! use proxisafe_perception::marker::pinhole_pose;
//! use proxisafe_types::{CameraIntrinsics, Point2};
//!
//! // An 80 px square centred on the principal point, 5 cm marker.
//! let corners = [
//!     Point2::new(280.0, 200.0),
//!     Point2::new(360.0, 200.0),
//!     Point2::new(360.0, 280.0),
//!     Point2::new(280.0, 280.0),
//! ];
//! let pose = pinhole_pose(&corners, 0.05, &CameraIntrinsics::default()).unwrap();
//! assert!((pose.raw_distance() - 0.5).abs() < 1e-9);
//! ```

use proxisafe_hal::CameraFrame;
use proxisafe_types::{CameraIntrinsics, MarkerObservation, Point2, PoseEstimate, SafetyError};

/// Smallest mean side length, in pixels, accepted for pose recovery.
pub const MIN_SIDE_PX: f64 = 1.0;

/// Detection + pose recovery primitive.
pub trait MarkerAdapter: Send {
    /// All candidate markers visible in `frame`, in detection order.
    fn detect(&self, frame: &CameraFrame) -> Vec<MarkerObservation>;

    /// Recover the marker pose from its corners.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::PoseEstimation`] for degenerate geometry.
    fn estimate_pose(
        &self,
        corners: &[Point2; 4],
        marker_size: f64,
        intrinsics: &CameraIntrinsics,
    ) -> Result<PoseEstimate, SafetyError> {
        pinhole_pose(corners, marker_size, intrinsics)
    }
}

/// Adapter for builds without a marker detector: never sees anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMarkers;

impl MarkerAdapter for NoMarkers {
    fn detect(&self, _frame: &CameraFrame) -> Vec<MarkerObservation> {
        Vec::new()
    }
}

/// Square-marker pose from a pinhole camera model.
///
/// Depth follows from the apparent side length (`z = fx · size / side_px`);
/// the lateral offsets back-project the corner centroid through the
/// principal point.  Corners are assumed to be already undistorted.
///
/// # Errors
///
/// Returns [`SafetyError::PoseEstimation`] when a corner is not finite, the
/// mean side is shorter than [`MIN_SIDE_PX`], or the marker size or focal
/// lengths are not positive.
pub fn pinhole_pose(
    corners: &[Point2; 4],
    marker_size: f64,
    intrinsics: &CameraIntrinsics,
) -> Result<PoseEstimate, SafetyError> {
    if corners.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(SafetyError::PoseEstimation("non-finite corner".into()));
    }
    if ![marker_size, intrinsics.fx, intrinsics.fy]
        .iter()
        .all(|v| v.is_finite() && *v > 0.0)
    {
        return Err(SafetyError::PoseEstimation(format!(
            "invalid geometry: size={marker_size}, fx={}, fy={}",
            intrinsics.fx, intrinsics.fy
        )));
    }

    let mean_side = (0..4)
        .map(|i| corners[i].distance_to(&corners[(i + 1) % 4]))
        .sum::<f64>()
        / 4.0;
    if mean_side < MIN_SIDE_PX {
        return Err(SafetyError::PoseEstimation(format!(
            "marker too small: {mean_side:.3} px"
        )));
    }

    let u = corners.iter().map(|c| c.x).sum::<f64>() / 4.0;
    let v = corners.iter().map(|c| c.y).sum::<f64>() / 4.0;
    let z = intrinsics.fx * marker_size / mean_side;

    Ok(PoseEstimate {
        translation: [
            (u - intrinsics.cx) * z / intrinsics.fx,
            (v - intrinsics.cy) * z / intrinsics.fy,
            z,
        ],
    })
}
