//! Synthetic placeholder camera used when no physical or networked source is
//! usable.
//!
//! Renders a dark frame with a horizontal bar sweeping up and down so viewers
//! can see the pipeline is alive.  Rendering cannot fail, which is what keeps
//! the whole monitor live under total hardware absence.

use std::time::Instant;

use proxisafe_types::SafetyError;

use crate::camera::{Camera, CameraFrame};
use crate::draw;

/// Default synthetic frame size (matches a 16:9 480p feed).
pub const DEFAULT_SYNTHETIC_SIZE: (u32, u32) = (854, 480);

const BACKGROUND: [u8; 3] = [12, 12, 12];
const BAR: [u8; 3] = [220, 120, 40];
const CAPTION: [u8; 3] = [180, 180, 180];

/// Time-varying placeholder imagery. Always succeeds.
pub struct SyntheticCamera {
    id: String,
    width: u32,
    height: u32,
    started: Instant,
}

impl SyntheticCamera {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_size(id, DEFAULT_SYNTHETIC_SIZE.0, DEFAULT_SYNTHETIC_SIZE.1)
    }

    /// Sizes below 64×64 are raised to 64×64 so the caption and bar fit.
    pub fn with_size(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width: width.max(64),
            height: height.max(64),
            started: Instant::now(),
        }
    }

    /// Render the frame for the current instant.
    pub fn frame(&self) -> CameraFrame {
        self.frame_at(self.started.elapsed().as_secs_f64())
    }

    /// Render the frame `t` seconds after start.
    pub fn frame_at(&self, t: f64) -> CameraFrame {
        let (w, h) = (self.width as i64, self.height as i64);
        let mut frame = CameraFrame::filled(self.width, self.height, BACKGROUND);

        let sweep = (t / 1.3).sin() * 0.5 + 0.5;
        let y = (sweep * (h - 60) as f64) as i64 + 30;
        draw::fill_rect(&mut frame, 30, y - 8, w - 30, y + 8, BAR);

        let scale = if w >= 400 { 2 } else { 1 };
        draw::draw_text(
            &mut frame,
            12,
            8,
            "DEMO CAMERA (NO WEBCAM/STREAM)",
            scale,
            CAPTION,
        );
        frame
    }
}

impl Camera for SyntheticCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, SafetyError> {
        Ok(self.frame())
    }
}
