//! Minimal raster primitives on [`CameraFrame`]s.
//!
//! Text uses a fixed 5×7 bitmap font (upper case, digits and a little
//! punctuation); lower-case input is drawn upper case.

use crate::camera::CameraFrame;

/// Glyph cell width in font pixels, including one column of spacing.
pub const GLYPH_ADVANCE: i64 = 6;
/// Glyph height in font pixels.
pub const GLYPH_HEIGHT: i64 = 7;

/// Fill the half-open rectangle `[x0, x1) × [y0, y1)`, clipped to the frame.
pub fn fill_rect(frame: &mut CameraFrame, x0: i64, y0: i64, x1: i64, y1: i64, rgb: [u8; 3]) {
    let x_start = x0.max(0);
    let y_start = y0.max(0);
    let x_end = x1.min(frame.width as i64);
    let y_end = y1.min(frame.height as i64);
    for y in y_start..y_end {
        for x in x_start..x_end {
            frame.put_pixel(x, y, rgb);
        }
    }
}

/// Outline a rectangle with the given stroke thickness.
pub fn stroke_rect(
    frame: &mut CameraFrame,
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
    thickness: i64,
    rgb: [u8; 3],
) {
    let t = thickness.max(1);
    fill_rect(frame, x0, y0, x1, y0 + t, rgb);
    fill_rect(frame, x0, y1 - t, x1, y1, rgb);
    fill_rect(frame, x0, y0, x0 + t, y1, rgb);
    fill_rect(frame, x1 - t, y0, x1, y1, rgb);
}

/// Bresenham line between two points.
pub fn draw_line(frame: &mut CameraFrame, from: (i64, i64), to: (i64, i64), rgb: [u8; 3]) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        frame.put_pixel(x, y, rgb);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Pixel width of `text` rendered at `scale`.
pub fn text_width(text: &str, scale: i64) -> i64 {
    text.chars().count() as i64 * GLYPH_ADVANCE * scale.max(1)
}

/// Draw `text` with its top-left corner at `(x, y)`.
pub fn draw_text(frame: &mut CameraFrame, x: i64, y: i64, text: &str, scale: i64, rgb: [u8; 3]) {
    let scale = scale.max(1);
    let mut pen_x = x;
    for ch in text.chars() {
        let rows = glyph(ch);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..5 {
                if bits & (0x10 >> col) != 0 {
                    let px = pen_x + col * scale;
                    let py = y + row as i64 * scale;
                    fill_rect(frame, px, py, px + scale, py + scale, rgb);
                }
            }
        }
        pen_x += GLYPH_ADVANCE * scale;
    }
}

/// Draw `text` on a filled backing box so it stays legible on any frame.
pub fn draw_label(
    frame: &mut CameraFrame,
    x: i64,
    y: i64,
    text: &str,
    scale: i64,
    fg: [u8; 3],
    bg: [u8; 3],
) {
    let pad = scale.max(1) * 2;
    fill_rect(
        frame,
        x - pad,
        y - pad,
        x + text_width(text, scale) + pad,
        y + GLYPH_HEIGHT * scale.max(1) + pad,
        bg,
    );
    draw_text(frame, x, y, text, scale, fg);
}

fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        ' ' => [0x00; 7],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(frame: &CameraFrame, rgb: [u8; 3]) -> usize {
        frame.data.chunks_exact(3).filter(|px| *px == rgb).count()
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut frame = CameraFrame::filled(10, 10, [0, 0, 0]);
        fill_rect(&mut frame, -5, -5, 3, 2, [255, 0, 0]);
        assert_eq!(count(&frame, [255, 0, 0]), 6);
    }

    #[test]
    fn stroke_rect_leaves_interior_untouched() {
        let mut frame = CameraFrame::filled(10, 10, [0, 0, 0]);
        stroke_rect(&mut frame, 0, 0, 10, 10, 1, [0, 255, 0]);
        assert_eq!(count(&frame, [0, 255, 0]), 36);
        assert_eq!(frame.pixel(5, 5), Some([0, 0, 0]));
    }

    #[test]
    fn line_hits_both_endpoints() {
        let mut frame = CameraFrame::filled(20, 20, [0, 0, 0]);
        draw_line(&mut frame, (1, 2), (17, 9), [1, 1, 1]);
        assert_eq!(frame.pixel(1, 2), Some([1, 1, 1]));
        assert_eq!(frame.pixel(17, 9), Some([1, 1, 1]));
    }

    #[test]
    fn text_draws_something_and_lowercase_matches_uppercase() {
        let mut upper = CameraFrame::filled(40, 10, [0, 0, 0]);
        let mut lower = upper.clone();
        draw_text(&mut upper, 1, 1, "RISK", 1, [9, 9, 9]);
        draw_text(&mut lower, 1, 1, "risk", 1, [9, 9, 9]);
        assert!(count(&upper, [9, 9, 9]) > 0);
        assert_eq!(upper, lower);
        assert_eq!(text_width("RISK", 2), 48);
    }
}
