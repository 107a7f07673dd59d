//! Image decoding, face extraction and mood classification.
//!
//! The face detector and the mood model are external collaborators reached
//! through the [`FaceDetector`] and [`MoodModel`] traits. Everything else in
//! here is plain pixel plumbing around them.

pub mod classifier;
pub mod decoder;
pub mod face;
#[cfg(feature = "onnx")]
pub mod onnx;
mod pipeline;

pub use classifier::{ModelInput, MoodClassifier, MoodModel, MODEL_INPUT_SIZE};
pub use decoder::{decode_base64_image, decode_image_bytes, DecodeError};
pub use face::{ExtractedFace, FaceDetector, FaceExtractor, FaceRegion};
pub use pipeline::{MoodDetector, VisionModels};

use thiserror::Error;

/// Failures of the detection pipeline itself (as opposed to bad input).
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Face detector failed: {0}")]
    Detector(String),

    #[error("Mood model failed: {0}")]
    Model(String),

    #[error("Model returned an empty probability vector")]
    EmptyPrediction,

    #[error("Inference task was cancelled or panicked: {0}")]
    Task(#[from] tokio::task::JoinError),
}
