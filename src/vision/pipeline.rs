//! Full detection pass over a decoded image: face extraction, then mood
//! classification of the chosen face.

use image::RgbImage;
use std::sync::Arc;
use tracing::debug;

use super::{FaceDetector, FaceExtractor, MoodClassifier, MoodModel, VisionError};
use crate::mood::DetectionResult;

/// Face extraction followed by mood classification.
pub struct MoodDetector {
    extractor: FaceExtractor,
    classifier: MoodClassifier,
}

impl MoodDetector {
    pub fn new(detector: Arc<dyn FaceDetector>, model: Arc<dyn MoodModel>) -> Self {
        Self {
            extractor: FaceExtractor::new(detector),
            classifier: MoodClassifier::new(model),
        }
    }

    /// Runs the whole pipeline on the calling thread. `Ok(None)` when no face
    /// was found.
    pub fn detect(&self, image: &RgbImage) -> Result<Option<DetectionResult>, VisionError> {
        let Some(face) = self.extractor.extract(image)? else {
            debug!("No face found in {}x{} image", image.width(), image.height());
            return Ok(None);
        };
        let result = self.classifier.classify(&face.pixels)?;
        debug!(
            "Detected {} ({:.3}) in face at {:?}",
            result.mood, result.confidence, face.region
        );
        Ok(Some(result))
    }

    /// Same as [`MoodDetector::detect`], on the blocking thread pool.
    pub async fn detect_blocking(
        self: &Arc<Self>,
        image: RgbImage,
    ) -> Result<Option<DetectionResult>, VisionError> {
        let detector = Arc::clone(self);
        tokio::task::spawn_blocking(move || detector.detect(&image)).await?
    }
}

/// Whatever model backends could be loaded at startup.
#[derive(Clone, Default)]
pub struct VisionModels {
    pub face_detector: Option<Arc<dyn FaceDetector>>,
    pub mood_model: Option<Arc<dyn MoodModel>>,
}

impl VisionModels {
    pub fn face_detector_loaded(&self) -> bool {
        self.face_detector.is_some()
    }

    pub fn mood_model_loaded(&self) -> bool {
        self.mood_model.is_some()
    }

    /// The full pipeline, available only when both backends are loaded.
    pub fn detector(&self) -> Option<MoodDetector> {
        match (&self.face_detector, &self.mood_model) {
            (Some(detector), Some(model)) => {
                Some(MoodDetector::new(detector.clone(), model.clone()))
            }
            _ => None,
        }
    }
}
