//! `proxisafe-hal` – Hardware Abstraction Layer
//!
//! Everything that touches a physical or networked device lives here, behind
//! traits the rest of the workspace can mock.
//!
//! # Modules
//!
//! - [`camera`] – [`Camera`][camera::Camera] trait and the RGB24
//!   [`CameraFrame`][camera::CameraFrame] buffer.
//! - [`capture`] – [`CaptureSourceManager`][capture::CaptureSourceManager]:
//!   probes stream → snapshot → local device → synthetic at startup and
//!   demotes one-way after sustained read failures.
//! - [`stream`], [`snapshot`], [`synthetic`], [`device`] – the individual
//!   acquisition drivers.
//! - [`sensors`] – [`TelemetrySource`][sensors::TelemetrySource] contract and
//!   the simulated [`SensorBank`][sensors::SensorBank].
//! - [`draw`] – raster primitives and a 5×7 bitmap font shared by the
//!   synthetic camera and the HUD overlay.

pub mod camera;
pub mod capture;
pub mod device;
pub mod draw;
pub mod sensors;
pub mod snapshot;
pub mod stream;
pub mod synthetic;

pub use camera::{Camera, CameraFrame};
pub use capture::{CaptureConfig, CaptureSourceManager};
pub use device::DeviceBackend;
pub use sensors::{SensorBank, StressWindow, TelemetrySource};
pub use synthetic::SyntheticCamera;
