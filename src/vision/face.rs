//! Face region selection on top of an external face detector.

use image::{imageops, GrayImage, RgbImage};
use std::sync::Arc;
use tracing::debug;

use super::VisionError;

/// Axis-aligned face bounding box, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Clips the region to an image of the given size. Returns `None` if
    /// nothing of the region is left.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<FaceRegion> {
        if self.x >= image_width || self.y >= image_height {
            return None;
        }
        let width = self.width.min(image_width - self.x);
        let height = self.height.min(image_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(FaceRegion::new(self.x, self.y, width, height))
    }
}

/// External face detector (cascade, ONNX network, ...).
pub trait FaceDetector: Send + Sync {
    /// Returns zero or more candidate face regions, in detector order.
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceRegion>, VisionError>;
}

/// Picks the region with the largest area; ties keep the earliest one.
pub fn select_largest(regions: &[FaceRegion]) -> Option<FaceRegion> {
    regions.iter().fold(None, |best: Option<FaceRegion>, region| match best {
        Some(current) if current.area() >= region.area() => Some(current),
        _ => Some(*region),
    })
}

/// The chosen face, cropped out of the grayscale frame.
#[derive(Debug, Clone)]
pub struct ExtractedFace {
    pub region: FaceRegion,
    pub pixels: GrayImage,
}

pub struct FaceExtractor {
    detector: Arc<dyn FaceDetector>,
}

impl FaceExtractor {
    pub fn new(detector: Arc<dyn FaceDetector>) -> Self {
        Self { detector }
    }

    /// Finds the largest face in the image.
    ///
    /// `Ok(None)` means the detector ran fine and saw no face.
    pub fn extract(&self, image: &RgbImage) -> Result<Option<ExtractedFace>, VisionError> {
        let gray = imageops::grayscale(image);
        let (width, height) = gray.dimensions();

        let regions: Vec<FaceRegion> = self
            .detector
            .detect(&gray)?
            .into_iter()
            .filter_map(|region| region.clamp_to(width, height))
            .collect();

        debug!("Detector returned {} usable face regions", regions.len());

        let Some(region) = select_largest(&regions) else {
            return Ok(None);
        };

        let pixels =
            imageops::crop_imm(&gray, region.x, region.y, region.width, region.height).to_image();
        Ok(Some(ExtractedFace { region, pixels }))
    }
}
