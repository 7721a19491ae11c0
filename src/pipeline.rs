//! Per-tick frame pipeline
//!
//! Composes the displayed frame from the latest camera frame, the latest
//! detection set and the toggle state: resize/flip, category filter,
//! annotation, then the selected image filter. No state crosses ticks apart
//! from the last ingested and last composed frames.

use image::imageops::FilterType;
use image::RgbaImage;

use crate::annotate;
use crate::camera::CameraFrame;
use crate::detect::{Category, Detection};
use crate::filters::Filter;

/// Mirror correction applied to incoming frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mirror {
    /// No flip
    None,
    /// Flip around the vertical axis (selfie mirror)
    Horizontal,
    /// Flip both axes (upside-down mount)
    Both,
}

/// User-controlled booleans and the selected filter. Owned by the UI thread,
/// read once per tick.
#[derive(Clone, Copy, Debug)]
pub struct ToggleState {
    pub detect_enabled: bool,
    pub detect_person: bool,
    pub detect_object: bool,
    pub detect_obstacle: bool,
    pub filter: Filter,
}

impl Default for ToggleState {
    fn default() -> Self {
        Self {
            detect_enabled: true,
            detect_person: true,
            detect_object: true,
            detect_obstacle: true,
            filter: Filter::None,
        }
    }
}

impl ToggleState {
    /// Whether detections of `category` are kept for annotation.
    pub fn retains(&self, category: Category) -> bool {
        if !self.detect_enabled {
            return false;
        }
        match category {
            Category::Person => self.detect_person,
            Category::Obstacle => self.detect_obstacle,
            Category::Object => self.detect_object,
        }
    }
}

/// Drop detections whose category toggle is off.
pub fn retain_detections<'a>(
    detections: &'a [Detection],
    toggles: &ToggleState,
) -> Vec<&'a Detection> {
    detections
        .iter()
        .filter(|d| toggles.retains(d.category()))
        .collect()
}

/// Holds the per-tick frames: the raw canvas frame (what a snapshot saves)
/// and the composed frame (what the render sink displays).
pub struct Pipeline {
    canvas_width: u32,
    canvas_height: u32,
    mirror: Mirror,
    raw: Option<RgbaImage>,
    composed: Option<RgbaImage>,
    last_frame_number: Option<u64>,
}

impl Pipeline {
    pub fn new(canvas_width: u32, canvas_height: u32, mirror: Mirror) -> Self {
        Self {
            canvas_width,
            canvas_height,
            mirror,
            raw: None,
            composed: None,
            last_frame_number: None,
        }
    }

    /// Resize and flip a camera frame into the raw canvas slot. Returns
    /// false (leaving the slot untouched) for frames already ingested or
    /// frames with inconsistent buffer sizes.
    pub fn ingest(&mut self, frame: &CameraFrame) -> bool {
        if let Some(last) = self.last_frame_number {
            if frame.frame_number <= last {
                return false;
            }
        }

        let Some(image) = RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        else {
            log::warn!(
                "Dropping malformed camera frame ({}x{}, {} bytes)",
                frame.width,
                frame.height,
                frame.data.len()
            );
            return false;
        };

        let resized = if image.dimensions() == (self.canvas_width, self.canvas_height) {
            image
        } else {
            image::imageops::resize(
                &image,
                self.canvas_width,
                self.canvas_height,
                FilterType::Triangle,
            )
        };

        let flipped = match self.mirror {
            Mirror::None => resized,
            Mirror::Horizontal => image::imageops::flip_horizontal(&resized),
            Mirror::Both => image::imageops::rotate180(&resized),
        };

        self.raw = Some(flipped);
        self.last_frame_number = Some(frame.frame_number);
        true
    }

    /// Annotate the retained detections onto a copy of the raw frame and
    /// apply the selected filter. Returns the number of retained detections.
    /// Without a raw frame this is a no-op and the last composed frame stays
    /// as it was.
    pub fn compose(&mut self, detections: &[Detection], toggles: &ToggleState) -> usize {
        let Some(raw) = &self.raw else {
            return 0;
        };

        let mut frame = raw.clone();
        let retained = retain_detections(detections, toggles);
        annotate::annotate(&mut frame, &retained);

        self.composed = Some(toggles.filter.apply(frame));
        retained.len()
    }

    /// The raw (unannotated, unfiltered) canvas frame.
    pub fn raw_frame(&self) -> Option<&RgbaImage> {
        self.raw.as_ref()
    }

    /// The last composed frame for display.
    pub fn composed_frame(&self) -> Option<&RgbaImage> {
        self.composed.as_ref()
    }

    /// Canvas dimensions.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::time::Instant;

    fn camera_frame(width: u32, height: u32, frame_number: u64, fill: u8) -> CameraFrame {
        CameraFrame {
            data: vec![fill; (width * height * 4) as usize],
            width,
            height,
            frame_number,
            timestamp: Instant::now(),
        }
    }

    fn detection(class_id: usize) -> Detection {
        Detection {
            class_id,
            confidence: 0.9,
            x1: 10,
            y1: 10,
            x2: 40,
            y2: 40,
        }
    }

    #[test]
    fn test_ingest_resizes_to_canvas() {
        let mut pipeline = Pipeline::new(100, 50, Mirror::Horizontal);
        assert!(pipeline.ingest(&camera_frame(200, 100, 0, 128)));
        assert_eq!(pipeline.raw_frame().unwrap().dimensions(), (100, 50));
    }

    #[test]
    fn test_ingest_rejects_stale_frames() {
        let mut pipeline = Pipeline::new(100, 50, Mirror::None);
        assert!(pipeline.ingest(&camera_frame(100, 50, 3, 10)));
        assert!(!pipeline.ingest(&camera_frame(100, 50, 3, 200)));
        assert!(!pipeline.ingest(&camera_frame(100, 50, 2, 200)));
        // The raw slot still holds the first frame's pixels
        assert_eq!(pipeline.raw_frame().unwrap().get_pixel(0, 0)[0], 10);
        assert!(pipeline.ingest(&camera_frame(100, 50, 4, 200)));
    }

    #[test]
    fn test_ingest_rejects_malformed_buffer() {
        let mut pipeline = Pipeline::new(100, 50, Mirror::None);
        let mut frame = camera_frame(100, 50, 0, 0);
        frame.data.truncate(16);
        assert!(!pipeline.ingest(&frame));
        assert!(pipeline.raw_frame().is_none());
    }

    #[test]
    fn test_compose_without_frame_keeps_last_composed() {
        let mut pipeline = Pipeline::new(100, 50, Mirror::None);
        assert_eq!(pipeline.compose(&[], &ToggleState::default()), 0);
        assert!(pipeline.composed_frame().is_none());

        pipeline.ingest(&camera_frame(100, 50, 0, 128));
        pipeline.compose(&[], &ToggleState::default());
        let before = pipeline.composed_frame().unwrap().clone();

        // A tick with no new camera frame leaves the displayed frame alone
        pipeline.compose(&[], &ToggleState::default());
        assert_eq!(pipeline.composed_frame().unwrap().as_raw(), before.as_raw());
    }

    #[test]
    fn test_category_toggles_drop_matching_detections() {
        let detections = vec![
            detection(0), // person
            detection(2), // car -> obstacle
            detection(16), // dog -> object
        ];

        let mut toggles = ToggleState::default();
        toggles.detect_person = false;
        let retained = retain_detections(&detections, &toggles);
        assert_eq!(retained.len(), 2);
        assert!(retained.iter().all(|d| d.category() != Category::Person));

        toggles = ToggleState::default();
        toggles.detect_obstacle = false;
        let retained = retain_detections(&detections, &toggles);
        assert_eq!(retained.len(), 2);
        assert!(retained.iter().all(|d| d.category() != Category::Obstacle));

        toggles = ToggleState::default();
        toggles.detect_enabled = false;
        assert!(retain_detections(&detections, &toggles).is_empty());
    }

    #[test]
    fn test_compose_annotates_retained_only() {
        let mut pipeline = Pipeline::new(100, 50, Mirror::None);
        pipeline.ingest(&camera_frame(100, 50, 0, 0));

        let mut toggles = ToggleState::default();
        toggles.detect_person = false;

        let count = pipeline.compose(&[detection(0), detection(16)], &toggles);
        assert_eq!(count, 1);

        // The dog box got drawn
        let composed = pipeline.composed_frame().unwrap();
        assert_eq!(*composed.get_pixel(10, 10), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_raw_frame_is_unannotated() {
        let mut pipeline = Pipeline::new(100, 50, Mirror::None);
        pipeline.ingest(&camera_frame(100, 50, 0, 0));
        pipeline.compose(&[detection(16)], &ToggleState::default());

        // Snapshot source keeps the pre-annotation pixels
        assert_eq!(*pipeline.raw_frame().unwrap().get_pixel(10, 10), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_mirror_horizontal_flips_pixels() {
        let mut pipeline = Pipeline::new(4, 2, Mirror::Horizontal);
        let mut frame = camera_frame(4, 2, 0, 0);
        // Mark the top-left source pixel red
        frame.data[0] = 255;
        assert!(pipeline.ingest(&frame));
        let raw = pipeline.raw_frame().unwrap();
        assert_eq!(raw.get_pixel(3, 0)[0], 255);
        assert_eq!(raw.get_pixel(0, 0)[0], 0);
    }
}
