//! tunetrap-core: face location and emotion classification.
//!
//! SCRFD locates faces, a MediaPipe face mesh feeds the landmark
//! heuristic, and an optional trained classifier scores face crops. All
//! models run on ONNX Runtime.

pub mod classifier;
pub mod detector;
pub mod emotion;
pub mod heuristic;
pub mod locator;
pub mod mesh;
pub mod types;

pub use classifier::{ChannelOrder, EmotionModel};
pub use detector::ScrfdDetector;
pub use emotion::{
    ConfigError, DetectError, DetectorConfig, DetectorMode, EmotionClassifier, EmotionDetector,
};
pub use locator::FaceLocator;
pub use types::{BoundingBox, Classification, FaceBox, Label, LandmarkSet, Prediction};

/// Model file names expected inside the model directory.
pub const LOCATOR_MODEL_FILE: &str = "det_10g.onnx";
pub const MESH_MODEL_FILE: &str = "face_landmark.onnx";
pub const EMOTION_MODEL_FILE: &str = "emotion.onnx";
