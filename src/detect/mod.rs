//! Object detection module
//!
//! Wraps a pretrained YOLOv8 ONNX model behind ONNX Runtime. The model is
//! loaded once at startup (a missing model is a fatal error); inference runs
//! on a dedicated thread fed by a bounded channel, publishing the latest
//! detection set for the UI thread to pick up each tick.

pub mod classes;

pub use classes::Category;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use image::imageops::FilterType;
use image::RgbaImage;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use thiserror::Error;

/// Model filename resolved against the working and executable directories.
pub const MODEL_FILE: &str = "yolov8n.onnx";
/// YOLOv8 input size (square).
const INPUT_SIZE: u32 = 640;
/// Fixed confidence threshold; not exposed as configuration.
const CONF_THRESHOLD: f32 = 0.25;
/// IoU threshold for NMS.
const IOU_THRESHOLD: f32 = 0.45;

/// Detection errors
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("detection model {0:?} not found in the working or executable directory")]
    ModelNotFound(String),
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("unexpected model output shape {0:?}")]
    OutputShape(Vec<usize>),
    #[error("failed to spawn detect thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// One detected region: class, confidence and bounding box in frame pixels.
#[derive(Clone, Debug)]
pub struct Detection {
    /// COCO class id
    pub class_id: usize,
    /// Confidence score in [0, 1], used for display only
    pub confidence: f32,
    /// Left edge
    pub x1: i32,
    /// Top edge
    pub y1: i32,
    /// Right edge
    pub x2: i32,
    /// Bottom edge
    pub y2: i32,
}

impl Detection {
    /// Class name for display.
    pub fn label(&self) -> &'static str {
        classes::name(self.class_id)
    }

    /// Toggle category of this detection.
    pub fn category(&self) -> Category {
        Category::of(self.class_id)
    }

    /// Box width in pixels.
    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    /// Box height in pixels.
    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }
}

/// Latest published inference result.
#[derive(Clone, Default)]
pub struct DetectionSet {
    /// Detections after NMS, sorted by confidence descending
    pub detections: Vec<Detection>,
    /// Frame number the result corresponds to
    pub frame_number: u64,
}

/// Frame handed to the inference thread.
struct FrameJob {
    data: Vec<u8>,
    width: u32,
    height: u32,
    frame_number: u64,
}

/// Resolve the model file against the working directory, then the
/// executable's directory.
pub fn find_model() -> Result<PathBuf, DetectError> {
    if let Ok(cwd) = std::env::current_dir() {
        let path = cwd.join(MODEL_FILE);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(parent) = exe_path.parent() {
            let path = parent.join(MODEL_FILE);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    Err(DetectError::ModelNotFound(MODEL_FILE.to_string()))
}

/// Handle to the detection thread.
pub struct Detector {
    latest: Arc<Mutex<DetectionSet>>,
    frame_sender: Option<Sender<FrameJob>>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl Detector {
    /// Load the model and start the inference thread. Model load failures
    /// propagate; they are fatal at startup.
    pub fn new(model_path: &Path) -> Result<Self, DetectError> {
        ort::init().with_name("CameraDetect").commit()?;

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        log::info!("Loaded detection model from {:?}", model_path);

        let latest = Arc::new(Mutex::new(DetectionSet::default()));
        let (frame_sender, frame_receiver) = crossbeam_channel::bounded::<FrameJob>(2);

        let latest_clone = latest.clone();
        let thread_handle = std::thread::Builder::new()
            .name("detect".to_string())
            .spawn(move || {
                Self::detect_thread(session, frame_receiver, latest_clone);
            })?;

        Ok(Self {
            latest,
            frame_sender: Some(frame_sender),
            thread_handle: Some(thread_handle),
        })
    }

    fn detect_thread(
        mut session: Session,
        frame_receiver: Receiver<FrameJob>,
        latest: Arc<Mutex<DetectionSet>>,
    ) {
        log::info!("Detect thread started");

        while let Ok(job) = frame_receiver.recv() {
            match infer(&mut session, &job) {
                Ok(detections) => {
                    *latest.lock() = DetectionSet {
                        detections,
                        frame_number: job.frame_number,
                    };
                }
                Err(e) => {
                    // Keep the last good result; the feed stays up
                    log::warn!("Inference error: {}", e);
                }
            }
        }

        log::info!("Detect thread stopped");
    }

    /// Queue a frame for inference without blocking; the frame is dropped if
    /// the detector is still busy with earlier ones.
    pub fn process_frame(&self, frame: &RgbaImage, frame_number: u64) {
        if let Some(sender) = &self.frame_sender {
            let _ = sender.try_send(FrameJob {
                data: frame.as_raw().clone(),
                width: frame.width(),
                height: frame.height(),
                frame_number,
            });
        }
    }

    /// Latest published detection set.
    pub fn latest(&self) -> DetectionSet {
        self.latest.lock().clone()
    }

    /// Stop the inference thread.
    pub fn stop(&mut self) {
        self.frame_sender = None;
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Detector {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A raw box candidate before NMS, in frame pixel coordinates.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
    class_id: usize,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with another box.
    fn iou(&self, other: &Candidate) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}

/// Run one inference pass over a frame.
fn infer(session: &mut Session, job: &FrameJob) -> Result<Vec<Detection>, DetectError> {
    let input_tensor = preprocess(job)?;

    let outputs = session.run(ort::inputs!["images" => input_tensor])?;

    let (shape, data) = outputs["output0"].try_extract_tensor::<f32>()?;
    let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

    // YOLOv8 output: [1, 4 + num_classes, num_proposals]
    if dims.len() != 3 || dims[0] != 1 || dims[1] <= 4 {
        return Err(DetectError::OutputShape(dims));
    }
    let num_classes = dims[1] - 4;
    let num_proposals = dims[2];

    let scale_x = job.width as f32 / INPUT_SIZE as f32;
    let scale_y = job.height as f32 / INPUT_SIZE as f32;

    let candidates = decode(
        data,
        num_classes,
        num_proposals,
        scale_x,
        scale_y,
        job.width,
        job.height,
    );

    Ok(nms(candidates, IOU_THRESHOLD)
        .into_iter()
        .map(|c| Detection {
            class_id: c.class_id,
            confidence: c.confidence,
            x1: c.x1 as i32,
            y1: c.y1 as i32,
            x2: c.x2 as i32,
            y2: c.y2 as i32,
        })
        .collect())
}

/// Resize the frame to the model input size and convert to an NCHW float
/// tensor normalised to [0, 1].
fn preprocess(job: &FrameJob) -> Result<ort::value::DynValue, DetectError> {
    let frame = RgbaImage::from_raw(job.width, job.height, job.data.clone())
        .unwrap_or_else(|| RgbaImage::new(job.width.max(1), job.height.max(1)));

    let resized = image::imageops::resize(&frame, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
    let raw = resized.as_raw();

    let size = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut tensor_data = vec![0f32; 3 * size];
    for idx in 0..size {
        tensor_data[idx] = raw[idx * 4] as f32 / 255.0;
        tensor_data[size + idx] = raw[idx * 4 + 1] as f32 / 255.0;
        tensor_data[2 * size + idx] = raw[idx * 4 + 2] as f32 / 255.0;
    }

    let shape = [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize];
    Ok(Tensor::from_array((shape, tensor_data.into_boxed_slice()))?.into_dyn())
}

/// Decode raw YOLOv8 predictions into box candidates.
///
/// Data layout: `[cx, cy, w, h, cls0, cls1, ...]` rows, stored column-major
/// over proposals. Boxes are scaled from model input space to frame space
/// and clamped to the frame bounds.
fn decode(
    data: &[f32],
    num_classes: usize,
    num_proposals: usize,
    scale_x: f32,
    scale_y: f32,
    frame_width: u32,
    frame_height: u32,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for i in 0..num_proposals {
        let mut class_id = 0usize;
        let mut max_score = 0f32;
        for c in 0..num_classes {
            let score = data[(4 + c) * num_proposals + i];
            if score > max_score {
                max_score = score;
                class_id = c;
            }
        }

        if max_score < CONF_THRESHOLD {
            continue;
        }

        let cx = data[i];
        let cy = data[num_proposals + i];
        let w = data[2 * num_proposals + i];
        let h = data[3 * num_proposals + i];

        candidates.push(Candidate {
            x1: ((cx - w / 2.0) * scale_x).max(0.0),
            y1: ((cy - h / 2.0) * scale_y).max(0.0),
            x2: ((cx + w / 2.0) * scale_x).min(frame_width as f32),
            y2: ((cy + h / 2.0) * scale_y).min(frame_height as f32),
            confidence: max_score,
            class_id,
        });
    }

    candidates
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(mut boxes: Vec<Candidate>, iou_thresh: f32) -> Vec<Candidate> {
    boxes.sort_unstable_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(boxes[i]);
        for j in (i + 1)..boxes.len() {
            if boxes[i].iou(&boxes[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Candidate {
        Candidate {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id: 0,
        }
    }

    #[test]
    fn test_iou() {
        let a = candidate(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = candidate(0.0, 0.0, 10.0, 10.0, 1.0);
        assert!((a.iou(&b) - 1.0).abs() < 1e-6);

        let c = candidate(20.0, 20.0, 30.0, 30.0, 1.0);
        assert_eq!(a.iou(&c), 0.0);

        // Half overlap: intersection 50, union 150
        let d = candidate(5.0, 0.0, 15.0, 10.0, 1.0);
        assert!((a.iou(&d) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlaps() {
        let boxes = vec![
            candidate(0.0, 0.0, 10.0, 10.0, 0.9),
            candidate(1.0, 1.0, 11.0, 11.0, 0.8), // overlaps the first
            candidate(50.0, 50.0, 60.0, 60.0, 0.7),
        ];
        let kept = nms(boxes, 0.45);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_decode_threshold_and_argmax() {
        // 2 proposals, 3 classes: rows are [cx, cy, w, h, c0, c1, c2],
        // column-major over the 2 proposals.
        let num_proposals = 2;
        let num_classes = 3;
        #[rustfmt::skip]
        let data = vec![
            // cx          cy          w           h
            100.0, 320.0,  100.0, 320.0,  40.0, 640.0,  40.0, 640.0,
            // c0           c1            c2
            0.1, 0.05,      0.9, 0.1,     0.2, 0.2,
        ];

        let candidates = decode(&data, num_classes, num_proposals, 1.0, 1.0, 640, 640);

        // Only the first proposal clears the 0.25 threshold; argmax is class 1.
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_id, 1);
        assert!((candidates[0].confidence - 0.9).abs() < 1e-6);
        assert!((candidates[0].x1 - 80.0).abs() < 1e-3);
        assert!((candidates[0].y1 - 80.0).abs() < 1e-3);
        assert!((candidates[0].x2 - 120.0).abs() < 1e-3);
        assert!((candidates[0].y2 - 120.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_clamps_to_frame() {
        // One proposal, one class, box sticking out past the frame edge.
        let data = vec![10.0, 10.0, 100.0, 100.0, 0.8];
        let candidates = decode(&data, 1, 1, 1.0, 1.0, 64, 64);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].x1, 0.0);
        assert_eq!(candidates[0].y1, 0.0);
        assert_eq!(candidates[0].x2, 60.0);
        assert_eq!(candidates[0].y2, 60.0);
    }
}
