//! Local capture-device backends.
//!
//! A [`DeviceBackend`] knows how to open a numbered local camera through one
//! platform API.  The capture manager tries a short list of them in order
//! and keeps the first that reports itself open.

use proxisafe_types::SafetyError;

use crate::camera::Camera;

pub trait DeviceBackend: Send + Sync {
    /// Backend name for logs, e.g. `"v4l2"`.
    fn name(&self) -> &str;

    /// Open local device `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::Capture`] when the device does not exist or
    /// cannot be opened through this backend.
    fn open(&self, index: u32) -> Result<Box<dyn Camera>, SafetyError>;
}
