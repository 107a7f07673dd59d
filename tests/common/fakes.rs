//! In-process stand-ins for the vision models, plus image fixtures.

use super::constants::MODEL_CONFIDENCE;
use base64::Engine;
use image::{GrayImage, ImageFormat, Rgb, RgbImage};
use kaguya_server::mood::MoodLabel;
use kaguya_server::vision::{FaceDetector, FaceRegion, ModelInput, MoodModel, VisionError};
use std::io::Cursor;

/// Finds one face in the middle of any image that is not completely black.
pub struct FakeFaceDetector;

impl FaceDetector for FakeFaceDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceRegion>, VisionError> {
        if gray.pixels().all(|p| p.0[0] == 0) {
            return Ok(vec![]);
        }
        let (w, h) = gray.dimensions();
        Ok(vec![
            FaceRegion::new(0, 0, w / 4, h / 4),
            FaceRegion::new(w / 4, h / 4, w / 2, h / 2),
        ])
    }
}

/// Always predicts the same mood with [`MODEL_CONFIDENCE`].
pub struct FixedMoodModel {
    pub mood: MoodLabel,
}

impl MoodModel for FixedMoodModel {
    fn predict(&self, input: &ModelInput) -> Result<Vec<f32>, VisionError> {
        assert_eq!(input.shape, [1, 48, 48, 1], "unexpected model input shape");
        let index = MoodLabel::ALL
            .iter()
            .position(|m| *m == self.mood)
            .expect("mood is part of the label table");
        let rest = (1.0 - MODEL_CONFIDENCE) / (MoodLabel::ALL.len() - 1) as f32;
        let mut probabilities = vec![rest; MoodLabel::ALL.len()];
        probabilities[index] = MODEL_CONFIDENCE;
        Ok(probabilities)
    }
}

/// Encodes a solid-colour PNG.
pub fn png_bytes(width: u32, height: u32, value: u8) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([value, value, value]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("Failed to encode test PNG");
    bytes.into_inner()
}

/// Base64 PNG the fake detector finds a face in.
pub fn face_image_base64() -> String {
    base64::engine::general_purpose::STANDARD.encode(png_bytes(64, 64, 180))
}

/// Same image as a `data:` URL, the way browsers send canvas captures.
pub fn face_image_data_url() -> String {
    format!("data:image/png;base64,{}", face_image_base64())
}

/// Base64 PNG without any face in it.
pub fn blank_image_base64() -> String {
    base64::engine::general_purpose::STANDARD.encode(png_bytes(64, 64, 0))
}
