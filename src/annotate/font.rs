//! Tiny 5x7 bitmap font for label text drawn straight into the frame buffer.
//!
//! Single-case: lowercase letters render with the same glyphs as uppercase.
//! Coverage is letters, digits, space, dot and dash, which is all the label
//! strings use.

use image::{Rgba, RgbaImage};

/// Glyph cell width in font units.
pub const GLYPH_WIDTH: u32 = 5;
/// Glyph cell height in font units.
pub const GLYPH_HEIGHT: u32 = 7;
/// Horizontal advance per character (glyph plus one column of spacing).
pub const ADVANCE: u32 = GLYPH_WIDTH + 1;

/// Each glyph is seven rows of five bits, most significant bit on the left.
type Glyph = [u8; 7];

const LETTERS: [Glyph; 26] = [
    [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11], // A
    [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E], // B
    [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E], // C
    [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E], // D
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F], // E
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10], // F
    [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0E], // G
    [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11], // H
    [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E], // I
    [0x01, 0x01, 0x01, 0x01, 0x11, 0x11, 0x0E], // J
    [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11], // K
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F], // L
    [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11], // M
    [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11], // N
    [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E], // O
    [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10], // P
    [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D], // Q
    [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11], // R
    [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E], // S
    [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04], // T
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E], // U
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04], // V
    [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11], // W
    [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11], // X
    [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04], // Y
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F], // Z
];

const DIGITS: [Glyph; 10] = [
    [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E], // 0
    [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E], // 1
    [0x0E, 0x11, 0x01, 0x06, 0x08, 0x10, 0x1F], // 2
    [0x0E, 0x11, 0x01, 0x06, 0x01, 0x11, 0x0E], // 3
    [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02], // 4
    [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E], // 5
    [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E], // 6
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08], // 7
    [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E], // 8
    [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C], // 9
];

const DOT: Glyph = [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C];
const DASH: Glyph = [0x00, 0x00, 0x00, 0x0E, 0x00, 0x00, 0x00];
const SPACE: Glyph = [0x00; 7];
// Hollow box for anything outside the coverage
const UNKNOWN: Glyph = [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F];

fn glyph(c: char) -> Glyph {
    match c {
        'a'..='z' => LETTERS[(c as u8 - b'a') as usize],
        'A'..='Z' => LETTERS[(c as u8 - b'A') as usize],
        '0'..='9' => DIGITS[(c as u8 - b'0') as usize],
        '.' => DOT,
        '-' => DASH,
        ' ' => SPACE,
        _ => UNKNOWN,
    }
}

/// Pixel width of `text` at `scale`.
pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * ADVANCE * scale
}

/// Pixel height of a text line at `scale`.
pub fn text_height(scale: u32) -> u32 {
    GLYPH_HEIGHT * scale
}

/// Draw one line of text with its top-left corner at (x, y). Pixels falling
/// outside the image are skipped.
pub fn draw_text_line(image: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>, scale: u32) {
    let scale = scale.max(1);
    let mut pen_x = x;

    for c in text.chars() {
        draw_glyph(image, pen_x, y, glyph(c), color, scale);
        pen_x += (ADVANCE * scale) as i32;
    }
}

fn draw_glyph(image: &mut RgbaImage, x: i32, y: i32, glyph: Glyph, color: Rgba<u8>, scale: u32) {
    let (width, height) = image.dimensions();

    for (row, bits) in glyph.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = x + (col * scale + dx) as i32;
                    let py = y + (row as u32 * scale + dy) as i32;
                    if px >= 0 && (px as u32) < width && py >= 0 && (py as u32) < height {
                        image.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn test_text_metrics() {
        assert_eq!(text_width("person", 1), 6 * ADVANCE);
        assert_eq!(text_width("person", 2), 12 * ADVANCE);
        assert_eq!(text_height(2), 14);
    }

    #[test]
    fn test_draw_marks_pixels() {
        let mut image = RgbaImage::from_pixel(64, 16, Rgba([0, 0, 0, 255]));
        draw_text_line(&mut image, 1, 1, "a", WHITE, 1);
        let lit = image.pixels().filter(|p| p[0] == 255).count();
        assert!(lit > 0);
        // Nothing outside the glyph cell
        assert!(lit <= (GLYPH_WIDTH * GLYPH_HEIGHT) as usize);
    }

    #[test]
    fn test_draw_clips_at_edges() {
        let mut image = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        // Partially and fully out of bounds; must not panic
        draw_text_line(&mut image, -3, -3, "x", WHITE, 2);
        draw_text_line(&mut image, 100, 100, "x", WHITE, 2);
    }

    #[test]
    fn test_case_insensitive_glyphs() {
        let mut lower = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]));
        let mut upper = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]));
        draw_text_line(&mut lower, 0, 0, "k", WHITE, 1);
        draw_text_line(&mut upper, 0, 0, "K", WHITE, 1);
        assert_eq!(lower.as_raw(), upper.as_raw());
    }
}
