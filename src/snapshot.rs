//! Snapshot output
//!
//! Writes the current raw canvas frame as a JPEG in the working directory.
//! Filenames come from a process-monotonic counter; names already on disk
//! are skipped rather than overwritten.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use thiserror::Error;

/// Snapshot errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no frame captured yet")]
    NoFrame,
    #[error("failed to write snapshot: {0}")]
    Write(#[from] image::ImageError),
}

/// Counter-based snapshot writer.
pub struct SnapshotWriter {
    counter: u64,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    /// Save `frame` as `capture_<n>.jpg` under `dir`, returning the path
    /// written. JPEG carries no alpha, so the frame is flattened to RGB.
    pub fn save(&mut self, dir: &Path, frame: &RgbaImage) -> Result<PathBuf, SnapshotError> {
        let path = loop {
            let candidate = dir.join(format!("capture_{}.jpg", self.counter));
            self.counter += 1;
            if !candidate.exists() {
                break candidate;
            }
        };

        let rgb = image::DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
        rgb.save(&path)?;

        log::info!("Saved snapshot to {:?}", path);
        Ok(path)
    }
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "camera-detect-test-{}-{}",
            tag,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_save_creates_file() {
        let dir = temp_dir("save");
        let frame = RgbaImage::from_pixel(32, 32, Rgba([120, 90, 60, 255]));

        let mut writer = SnapshotWriter::new();
        let path = writer.save(&dir, &frame).unwrap();

        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "capture_0.jpg");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_counter_skips_existing_names() {
        let dir = temp_dir("counter");
        let frame = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]));

        let mut writer = SnapshotWriter::new();
        let first = writer.save(&dir, &frame).unwrap();
        let second = writer.save(&dir, &frame).unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
