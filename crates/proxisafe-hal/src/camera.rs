//! Frame source contract and the RGB24 frame buffer every driver produces.

use image::RgbImage;
use proxisafe_types::SafetyError;

/// One decoded RGB24 frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Packed RGB24 pixel data, row-major.
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// A frame of `width × height` pixels all set to `rgb`.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// `true` when the frame is non-empty and its buffer matches its
    /// dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize * 3
    }

    /// Set one pixel; coordinates outside the frame are ignored.
    pub fn put_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }

    /// View the frame as an [`RgbImage`] for encoding.
    ///
    /// Returns `None` when the buffer does not match the dimensions.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Decode a compressed still (JPEG, PNG) into an RGB24 frame.
///
/// # Errors
///
/// Returns [`SafetyError::Capture`] when the bytes are not a decodable
/// image.
pub fn decode_image(source_name: &str, bytes: &[u8]) -> Result<CameraFrame, SafetyError> {
    let image = image::load_from_memory(bytes).map_err(|e| SafetyError::Capture {
        source_name: source_name.to_string(),
        details: format!("decode failed: {e}"),
    })?;
    Ok(CameraFrame::from_rgb_image(image.to_rgb8()))
}

/// Anything that produces frames: a network stream, a local device, or
/// the synthetic placeholder.
///
/// Drivers implement this trait and are owned by the
/// [`CaptureSourceManager`][crate::capture::CaptureSourceManager].
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"mjpeg_stream"`.
    fn id(&self) -> &str;

    /// Block until the next frame is available or the driver gives up.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError::Capture`] if the frame cannot be captured
    /// (e.g. the device is disconnected or the read timed out).
    fn capture(&mut self) -> Result<CameraFrame, SafetyError>;
}
