//! Camera Detect - live object detection viewer
//!
//! Captures webcam frames, runs a pretrained YOLOv8 model through ONNX
//! Runtime, annotates the detections the user has toggled on, applies an
//! optional image filter and renders the result in a fixed-size window.

pub mod annotate;
pub mod app;
pub mod camera;
pub mod detect;
pub mod filters;
pub mod pipeline;
pub mod shell;
pub mod snapshot;

pub use app::{App, AppOptions};
