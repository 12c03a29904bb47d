//! Optional presence overlay (e.g. "human detected").
//!
//! A [`PresenceDetector`] only decorates the frame.  Its result never feeds
//! the distance or risk computation, and the pipeline logs and ignores any
//! error it returns.

use proxisafe_hal::CameraFrame;
use proxisafe_types::SafetyError;

/// Bounding box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub trait PresenceDetector: Send {
    /// First detected presence in `frame`, if any.
    fn detect(&self, frame: &CameraFrame) -> Result<Option<PresenceBox>, SafetyError>;
}

/// Detector for builds without one; never reports anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPresence;

impl PresenceDetector for NoPresence {
    fn detect(&self, _frame: &CameraFrame) -> Result<Option<PresenceBox>, SafetyError> {
        Ok(None)
    }
}
