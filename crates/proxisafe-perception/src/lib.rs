//! `proxisafe-perception` – from pixels to a stable distance.
//!
//! Turns per-frame fiducial marker observations into a smoothed
//! camera→marker distance the risk engine can rely on.
//!
//! # Modules
//!
//! - [`marker`] – [`MarkerAdapter`][marker::MarkerAdapter]: the boundary to a
//!   marker detection / pose recovery primitive, plus a default pinhole
//!   [`pinhole_pose`][marker::pinhole_pose] implementation.
//! - [`distance`] – [`DistanceFilter`][distance::DistanceFilter]: picks one
//!   observation per frame and runs it through a 3-sample median followed by
//!   an exponential moving average.
//! - [`fallback`] – [`virtual_distance`][fallback::virtual_distance]: the
//!   synthetic approach used while a stress window is active and no marker is
//!   visible.

pub mod distance;
pub mod fallback;
pub mod marker;

pub use distance::{DistanceEstimate, DistanceFilter, DistanceFilterConfig};
pub use fallback::virtual_distance;
pub use marker::{MarkerAdapter, NoMarkers, pinhole_pose};
