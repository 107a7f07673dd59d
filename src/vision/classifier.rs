//! Face crop -> model input tensor -> mood label.

use image::{imageops, GrayImage};
use std::sync::Arc;

use super::VisionError;
use crate::mood::{DetectedMood, DetectionResult};

/// Side length of the square grayscale input the mood model expects.
pub const MODEL_INPUT_SIZE: u32 = 48;

/// A normalized input batch in NHWC layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub data: Vec<f32>,
    pub shape: [usize; 4],
}

/// External mood classifier. Returns one probability per mood label.
pub trait MoodModel: Send + Sync {
    fn predict(&self, input: &ModelInput) -> Result<Vec<f32>, VisionError>;
}

/// Resizes the face to the model resolution and scales intensities to [0, 1].
///
/// The result has a batch and a channel dimension: `[1, 48, 48, 1]`.
pub fn prepare_input(face: &GrayImage) -> ModelInput {
    let resized = imageops::resize(
        face,
        MODEL_INPUT_SIZE,
        MODEL_INPUT_SIZE,
        imageops::FilterType::Triangle,
    );
    let data = resized
        .as_raw()
        .iter()
        .map(|&p| p as f32 / 255.0)
        .collect();

    let side = MODEL_INPUT_SIZE as usize;
    ModelInput {
        data,
        shape: [1, side, side, 1],
    }
}

/// Arg-max over the probability vector. The first maximum wins.
pub fn interpret(probabilities: &[f32]) -> Result<DetectionResult, VisionError> {
    let (index, confidence) = probabilities
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
            Some((_, best_p)) if !(p > best_p) => best,
            _ => Some((i, p)),
        })
        .ok_or(VisionError::EmptyPrediction)?;

    Ok(DetectionResult {
        mood: DetectedMood::from_index(index),
        confidence,
    })
}

pub struct MoodClassifier {
    model: Arc<dyn MoodModel>,
}

impl MoodClassifier {
    pub fn new(model: Arc<dyn MoodModel>) -> Self {
        Self { model }
    }

    pub fn classify(&self, face: &GrayImage) -> Result<DetectionResult, VisionError> {
        let input = prepare_input(face);
        let probabilities = self.model.predict(&input)?;
        interpret(&probabilities)
    }
}
