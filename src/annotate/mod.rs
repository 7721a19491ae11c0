//! Annotation stage
//!
//! Draws bounding rectangles and `label confidence` text for retained
//! detections directly onto the frame buffer. Labels do not avoid each
//! other; overlapping boxes overlap their text too.

pub mod font;

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::Detection;

/// Box and label color.
const COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
/// Rectangle outline thickness in pixels.
const THICKNESS: i32 = 2;
/// Label text scale factor over the base 5x7 font.
const TEXT_SCALE: u32 = 2;
/// Gap between the label baseline and the box top.
const LABEL_GAP: i32 = 3;

/// Draw all detections onto the frame.
pub fn annotate(frame: &mut RgbaImage, detections: &[&Detection]) {
    for detection in detections {
        draw_box(frame, detection);
        draw_label(frame, detection);
    }
}

fn draw_box(frame: &mut RgbaImage, detection: &Detection) {
    for inset in 0..THICKNESS {
        let width = detection.width() as i32 - 2 * inset;
        let height = detection.height() as i32 - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(detection.x1 + inset, detection.y1 + inset)
            .of_size(width as u32, height as u32);
        draw_hollow_rect_mut(frame, rect, COLOR);
    }
}

fn draw_label(frame: &mut RgbaImage, detection: &Detection) {
    let text = format!("{} {:.2}", detection.label(), detection.confidence);

    // Above the top-left corner, pushed inside the frame when the box sits
    // at the top edge
    let text_height = font::text_height(TEXT_SCALE) as i32;
    let mut y = detection.y1 - LABEL_GAP - text_height;
    if y < 0 {
        y = detection.y1 + LABEL_GAP;
    }
    let x = detection.x1.max(0);

    font::draw_text_line(frame, x, y, &text, COLOR, TEXT_SCALE);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection {
            class_id: 0,
            confidence: 0.87,
            x1,
            y1,
            x2,
            y2,
        }
    }

    fn is_green(pixel: &Rgba<u8>) -> bool {
        pixel[0] == 0 && pixel[1] == 255 && pixel[2] == 0
    }

    #[test]
    fn test_box_outline_is_drawn() {
        let mut frame = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        let d = detection(20, 30, 60, 80);
        annotate(&mut frame, &[&d]);

        // Outline corners, both outline rows
        assert!(is_green(frame.get_pixel(20, 30)));
        assert!(is_green(frame.get_pixel(21, 31)));
        assert!(is_green(frame.get_pixel(59, 79)));
        // Interior stays untouched
        assert!(!is_green(frame.get_pixel(40, 55)));
    }

    #[test]
    fn test_label_drawn_above_box() {
        let mut frame = RgbaImage::from_pixel(200, 100, Rgba([0, 0, 0, 255]));
        let d = detection(10, 40, 100, 90);
        annotate(&mut frame, &[&d]);

        let label_region_lit = (10..150).any(|x| (20..40).any(|y| is_green(frame.get_pixel(x, y))));
        assert!(label_region_lit);
    }

    #[test]
    fn test_label_pushed_inside_at_top_edge() {
        let mut frame = RgbaImage::from_pixel(200, 100, Rgba([0, 0, 0, 255]));
        let d = detection(10, 0, 100, 50);
        // Must not panic, and the text lands below the top edge instead
        annotate(&mut frame, &[&d]);
    }

    #[test]
    fn test_empty_detections_leave_frame_unchanged() {
        let mut frame = RgbaImage::from_pixel(50, 50, Rgba([7, 8, 9, 255]));
        let reference = frame.clone();
        annotate(&mut frame, &[]);
        assert_eq!(frame.as_raw(), reference.as_raw());
    }
}
