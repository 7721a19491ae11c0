//! Filter stage
//!
//! Cosmetic image transforms applied to the annotated frame before display.
//! Every filter is a stateless stock transform that preserves the frame
//! dimensions; `Filter::None` is the identity.

use image::imageops::FilterType;
use image::{GrayImage, Luma, RgbaImage};

/// Block size divisor for pixelation.
const PIXELATE_FACTOR: u32 = 20;

/// The selectable filters. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Filter {
    /// Identity passthrough
    #[default]
    None,
    Grayscale,
    Edge,
    Sepia,
    Invert,
    Blur,
    Sketch,
    Emboss,
    Pixelate,
    Contrast,
}

impl Filter {
    /// All filters in menu order, `None` last.
    pub const ALL: [Filter; 10] = [
        Filter::Grayscale,
        Filter::Edge,
        Filter::Sepia,
        Filter::Invert,
        Filter::Blur,
        Filter::Sketch,
        Filter::Emboss,
        Filter::Pixelate,
        Filter::Contrast,
        Filter::None,
    ];

    /// Menu label.
    pub fn label(&self) -> &'static str {
        match self {
            Filter::None => "None",
            Filter::Grayscale => "Grayscale",
            Filter::Edge => "Edge Detection",
            Filter::Sepia => "Sepia",
            Filter::Invert => "Invert",
            Filter::Blur => "Blur",
            Filter::Sketch => "Sketch",
            Filter::Emboss => "Emboss",
            Filter::Pixelate => "Pixelate",
            Filter::Contrast => "Contrast Boost",
        }
    }

    /// Apply the filter. The output has the same dimensions as the input.
    pub fn apply(&self, frame: RgbaImage) -> RgbaImage {
        match self {
            Filter::None => frame,
            Filter::Grayscale => grayscale(frame),
            Filter::Edge => edge(frame),
            Filter::Sepia => sepia(frame),
            Filter::Invert => invert(frame),
            Filter::Blur => image::imageops::blur(&frame, 4.0),
            Filter::Sketch => sketch(frame),
            Filter::Emboss => emboss(frame),
            Filter::Pixelate => pixelate(frame),
            Filter::Contrast => contrast(frame),
        }
    }
}

/// Expand a single-channel image back to RGBA with equal color channels.
fn gray_to_rgba(gray: &GrayImage) -> RgbaImage {
    let mut out = RgbaImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let v = pixel[0];
        out.put_pixel(x, y, image::Rgba([v, v, v, 255]));
    }
    out
}

fn grayscale(frame: RgbaImage) -> RgbaImage {
    gray_to_rgba(&image::imageops::grayscale(&frame))
}

fn edge(frame: RgbaImage) -> RgbaImage {
    let gray = image::imageops::grayscale(&frame);
    gray_to_rgba(&imageproc::edges::canny(&gray, 100.0, 200.0))
}

fn sepia(mut frame: RgbaImage) -> RgbaImage {
    for pixel in frame.pixels_mut() {
        let r = pixel[0] as f32;
        let g = pixel[1] as f32;
        let b = pixel[2] as f32;
        pixel[0] = (0.393 * r + 0.769 * g + 0.189 * b).min(255.0) as u8;
        pixel[1] = (0.349 * r + 0.686 * g + 0.168 * b).min(255.0) as u8;
        pixel[2] = (0.272 * r + 0.534 * g + 0.131 * b).min(255.0) as u8;
    }
    frame
}

fn invert(mut frame: RgbaImage) -> RgbaImage {
    // Inverts the color channels only; alpha is untouched
    image::imageops::invert(&mut frame);
    frame
}

/// Pencil-sketch composite: gray, inverted blur, color-dodge divide.
fn sketch(frame: RgbaImage) -> RgbaImage {
    let gray = image::imageops::grayscale(&frame);

    let mut inverted = gray.clone();
    for pixel in inverted.pixels_mut() {
        pixel[0] = 255 - pixel[0];
    }
    let blurred = image::imageops::blur(&inverted, 7.0);

    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let denom = (255u32 - blurred.get_pixel(x, y)[0] as u32).max(1);
        let v = (pixel[0] as u32 * 256 / denom).min(255) as u8;
        out.put_pixel(x, y, Luma([v]));
    }

    gray_to_rgba(&out)
}

fn emboss(frame: RgbaImage) -> RgbaImage {
    #[rustfmt::skip]
    let kernel = [
        0.0, -1.0, -1.0,
        1.0,  0.0, -1.0,
        1.0,  1.0,  0.0,
    ];
    let mut out = image::imageops::filter3x3(&frame, &kernel);
    // The kernel sums to zero, which would zero the alpha channel
    for pixel in out.pixels_mut() {
        pixel[3] = 255;
    }
    out
}

fn pixelate(frame: RgbaImage) -> RgbaImage {
    let (width, height) = frame.dimensions();
    let small_w = (width / PIXELATE_FACTOR).max(1);
    let small_h = (height / PIXELATE_FACTOR).max(1);
    let small = image::imageops::resize(&frame, small_w, small_h, FilterType::Triangle);
    image::imageops::resize(&small, width, height, FilterType::Nearest)
}

/// Histogram-equalize the luma channel and re-apply the per-pixel gain to
/// the color channels.
fn contrast(mut frame: RgbaImage) -> RgbaImage {
    let gray = image::imageops::grayscale(&frame);
    let equalized = imageproc::contrast::equalize_histogram(&gray);

    for (x, y, pixel) in frame.enumerate_pixels_mut() {
        let before = gray.get_pixel(x, y)[0] as f32;
        let after = equalized.get_pixel(x, y)[0] as f32;
        let gain = (after + 1.0) / (before + 1.0);
        pixel[0] = (pixel[0] as f32 * gain).min(255.0) as u8;
        pixel[1] = (pixel[1] as f32 * gain).min(255.0) as u8;
        pixel[2] = (pixel[2] as f32 * gain).min(255.0) as u8;
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn synthetic_frame() -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(100, 100, Rgba([30, 60, 90, 255]));
        // Some structure so edge/contrast have something to chew on
        for x in 40..60 {
            for y in 40..60 {
                frame.put_pixel(x, y, Rgba([220, 200, 180, 255]));
            }
        }
        frame
    }

    #[test]
    fn test_all_filters_preserve_dimensions() {
        for filter in Filter::ALL {
            let out = filter.apply(synthetic_frame());
            assert_eq!(
                out.dimensions(),
                (100, 100),
                "{:?} changed the frame dimensions",
                filter
            );
        }
    }

    #[test]
    fn test_none_is_identity() {
        let frame = synthetic_frame();
        let out = Filter::None.apply(frame.clone());
        assert_eq!(out.as_raw(), frame.as_raw());
    }

    #[test]
    fn test_invert_black_yields_white() {
        let frame = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        let out = Filter::Invert.apply(frame);
        for pixel in out.pixels() {
            assert_eq!(pixel[0], 255);
            assert_eq!(pixel[1], 255);
            assert_eq!(pixel[2], 255);
            assert_eq!(pixel[3], 255);
        }
    }

    #[test]
    fn test_grayscale_has_equal_channels() {
        let out = Filter::Grayscale.apply(synthetic_frame());
        for pixel in out.pixels() {
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
            assert_eq!(pixel[3], 255);
        }
    }

    #[test]
    fn test_sepia_known_pixel() {
        let frame = RgbaImage::from_pixel(4, 4, Rgba([100, 100, 100, 255]));
        let out = Filter::Sepia.apply(frame);
        let pixel = out.get_pixel(0, 0);
        // Rows of the sepia matrix times (100, 100, 100)
        assert_eq!(pixel[0], 135);
        assert_eq!(pixel[1], 120);
        assert_eq!(pixel[2], 93);
        assert_eq!(pixel[3], 255);
    }

    #[test]
    fn test_emboss_keeps_alpha_opaque() {
        let out = Filter::Emboss.apply(synthetic_frame());
        for pixel in out.pixels() {
            assert_eq!(pixel[3], 255);
        }
    }

    #[test]
    fn test_pixelate_uneven_dimensions() {
        let frame = RgbaImage::from_pixel(33, 17, Rgba([10, 20, 30, 255]));
        let out = Filter::Pixelate.apply(frame);
        assert_eq!(out.dimensions(), (33, 17));
    }
}
