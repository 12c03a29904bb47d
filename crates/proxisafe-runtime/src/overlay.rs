//! HUD rendering and JPEG encoding.
//!
//! The HUD mirrors what an operator needs at a glance: the distance line
//! (or a prompt to show a marker), the operational state coloured by
//! severity, the risk score, and the active capture mode.  The tracked
//! marker outline and any presence box are drawn on top.

use image::codecs::jpeg::JpegEncoder;
use proxisafe_hal::CameraFrame;
use proxisafe_hal::draw::{draw_label, draw_line, stroke_rect};
use proxisafe_kernel::RiskBand;
use proxisafe_types::{CaptureMode, MarkerObservation, OperationalState, SafetyError};

use crate::presence::PresenceBox;

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

const GREEN: [u8; 3] = [0, 255, 0];
const RED: [u8; 3] = [255, 0, 0];
const AMBER: [u8; 3] = [255, 200, 0];
const GREY: [u8; 3] = [200, 200, 200];
const PRESENCE: [u8; 3] = [100, 220, 50];
const BACKING: [u8; 3] = [0, 0, 0];

const SCALE: i64 = 2;
const LEFT: i64 = 20;
const LINE_STEP: i64 = 28;

/// Everything the HUD shows for one tick.
#[derive(Debug, Clone, Copy)]
pub struct Hud<'a> {
    pub distance: Option<f64>,
    pub virtual_distance: bool,
    pub risk: f64,
    pub state: OperationalState,
    pub capture_mode: CaptureMode,
    pub marker: Option<&'a MarkerObservation>,
    pub presence: Option<PresenceBox>,
}

/// Draw the HUD onto `frame` in place.
pub fn draw_hud(frame: &mut CameraFrame, hud: &Hud<'_>) {
    if let Some(marker) = hud.marker {
        outline_marker(frame, marker);
    }
    if let Some(b) = hud.presence {
        let (x, y) = (b.x as i64, b.y as i64);
        stroke_rect(frame, x, y, x + b.width as i64, y + b.height as i64, 2, PRESENCE);
        draw_label(frame, x, y - 12 - SCALE * 7, "HUMAN DETECTED", SCALE, PRESENCE, BACKING);
    }

    let mut y = 20;
    let distance_line = match hud.distance {
        Some(d) if hud.virtual_distance => format!("DISTANCE: {d:.2} M (VIRTUAL)"),
        Some(d) => format!("DISTANCE: {d:.2} M"),
        None => "SHOW ARUCO MARKER (4X4_50)".to_string(),
    };
    let distance_colour = if hud.distance.is_some() { GREEN } else { GREY };
    draw_label(frame, LEFT, y, &distance_line, SCALE, distance_colour, BACKING);

    y += LINE_STEP;
    let state_colour = match hud.state {
        OperationalState::Stopped => RED,
        OperationalState::Warning => AMBER,
        OperationalState::Running => GREEN,
    };
    draw_label(frame, LEFT, y, &format!("SYSTEM: {}", hud.state), SCALE, state_colour, BACKING);

    y += LINE_STEP;
    let risk_colour = match RiskBand::from_risk(hud.risk) {
        RiskBand::Critical => RED,
        RiskBand::Warning => AMBER,
        RiskBand::Safe => [0, 200, 255],
    };
    draw_label(frame, LEFT, y, &format!("RISK: {:.2}", hud.risk), SCALE, risk_colour, BACKING);

    y += LINE_STEP;
    let source = format!("SOURCE: {}", hud.capture_mode.to_string().to_uppercase());
    draw_label(frame, LEFT, y, &source, 1, GREY, BACKING);
}

fn outline_marker(frame: &mut CameraFrame, marker: &MarkerObservation) {
    let points: Vec<(i64, i64)> = marker
        .corners
        .iter()
        .map(|c| (c.x.round() as i64, c.y.round() as i64))
        .collect();
    for i in 0..points.len() {
        draw_line(frame, points[i], points[(i + 1) % points.len()], GREEN);
    }
    let (x, y) = points[0];
    draw_label(frame, x, y - 14, &format!("ID {}", marker.id), 1, GREEN, BACKING);
}

/// Encode `frame` as a baseline JPEG at `quality` (clamped to 1..=100).
///
/// # Errors
///
/// Returns [`SafetyError::Encoding`] when the frame buffer is inconsistent
/// or the encoder fails.
pub fn encode_jpeg(frame: &CameraFrame, quality: u8) -> Result<Vec<u8>, SafetyError> {
    let rgb = frame.to_rgb_image().ok_or_else(|| {
        SafetyError::Encoding(format!(
            "buffer of {} bytes does not match {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        ))
    })?;
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| SafetyError::Encoding(format!("JPEG encode failed: {e}")))?;
    Ok(buffer)
}
