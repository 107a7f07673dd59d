//! ONNX Runtime backed implementations of [`FaceDetector`] and [`MoodModel`].
//!
//! The mood model takes a `[1, 48, 48, 1]` grayscale batch and returns one
//! score per mood. The face detector is an UltraFace (RFB-320) network: input
//! `[1, 3, 240, 320]`, outputs `scores [1, N, 2]` and `boxes [1, N, 4]` with
//! corner coordinates relative to the image size.

use image::{imageops, GrayImage};
use ndarray::{Array, Array4};
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::{FaceDetector, FaceRegion, ModelInput, MoodModel, VisionError};

const DETECTOR_WIDTH: u32 = 320;
const DETECTOR_HEIGHT: u32 = 240;
const DETECTOR_SCORE_THRESHOLD: f32 = 0.7;
const DETECTOR_IOU_THRESHOLD: f32 = 0.3;

fn load_session(path: &Path) -> Result<Session, VisionError> {
    let session = Session::builder()
        .map_err(|e| VisionError::Model(format!("Failed to create session builder: {e}")))?
        .commit_from_file(path)
        .map_err(|e| VisionError::Model(format!("Failed to load {}: {e}", path.display())))?;
    info!("Loaded ONNX model {}", path.display());
    Ok(session)
}

/// Runs a session on one input tensor and returns every output as a flat
/// `f32` vector, in output order.
fn run_session(session: &Mutex<Session>, input: Array4<f32>) -> Result<Vec<Vec<f32>>, String> {
    let tensor = Value::from_array(input).map_err(|e| format!("Failed to build tensor: {e}"))?;
    let mut session = session
        .lock()
        .map_err(|_| "ONNX session lock poisoned".to_string())?;
    let outputs = session
        .run(ort::inputs![tensor])
        .map_err(|e| format!("Inference failed: {e}"))?;

    outputs
        .iter()
        .map(|(_, value)| {
            value
                .try_extract_tensor::<f32>()
                .map(|tensor| tensor.1.to_vec())
                .map_err(|e| format!("Failed to extract output tensor: {e}"))
        })
        .collect()
}

pub struct OnnxMoodModel {
    session: Mutex<Session>,
}

impl OnnxMoodModel {
    pub fn load(path: &Path) -> Result<Self, VisionError> {
        Ok(Self {
            session: Mutex::new(load_session(path)?),
        })
    }
}

impl MoodModel for OnnxMoodModel {
    fn predict(&self, input: &ModelInput) -> Result<Vec<f32>, VisionError> {
        let [n, h, w, c] = input.shape;
        let array = Array::from_shape_vec((n, h, w, c), input.data.clone())
            .map_err(|e| VisionError::Model(format!("Bad input shape: {e}")))?;
        let mut outputs = run_session(&self.session, array).map_err(VisionError::Model)?;
        if outputs.is_empty() {
            return Err(VisionError::Model("Model produced no outputs".to_string()));
        }
        Ok(outputs.swap_remove(0))
    }
}

pub struct OnnxFaceDetector {
    session: Mutex<Session>,
}

impl OnnxFaceDetector {
    pub fn load(path: &Path) -> Result<Self, VisionError> {
        Ok(Self {
            session: Mutex::new(load_session(path)?),
        })
    }

    fn prepare(gray: &GrayImage) -> Array4<f32> {
        let resized = imageops::resize(
            gray,
            DETECTOR_WIDTH,
            DETECTOR_HEIGHT,
            imageops::FilterType::Triangle,
        );
        let (w, h) = (DETECTOR_WIDTH as usize, DETECTOR_HEIGHT as usize);
        // Grayscale replicated over the three RGB channels.
        Array4::from_shape_fn((1, 3, h, w), |(_, _, y, x)| {
            (resized.get_pixel(x as u32, y as u32).0[0] as f32 - 127.0) / 128.0
        })
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceRegion>, VisionError> {
        let outputs = run_session(&self.session, Self::prepare(gray)).map_err(VisionError::Detector)?;
        let [scores, boxes] = outputs.as_slice() else {
            return Err(VisionError::Detector(format!(
                "Expected 2 detector outputs, got {}",
                outputs.len()
            )));
        };

        let candidates: Vec<Candidate> = scores
            .chunks_exact(2)
            .zip(boxes.chunks_exact(4))
            .filter(|(score, _)| score[1] > DETECTOR_SCORE_THRESHOLD)
            .map(|(score, bbox)| Candidate {
                score: score[1],
                bbox: [bbox[0], bbox[1], bbox[2], bbox[3]],
            })
            .collect();

        let kept = non_max_suppression(candidates, DETECTOR_IOU_THRESHOLD);
        debug!("Face detector kept {} boxes", kept.len());

        let (width, height) = (gray.width() as f32, gray.height() as f32);
        Ok(kept
            .iter()
            .map(|c| {
                let x1 = (c.bbox[0] * width).clamp(0.0, width);
                let y1 = (c.bbox[1] * height).clamp(0.0, height);
                let x2 = (c.bbox[2] * width).clamp(0.0, width);
                let y2 = (c.bbox[3] * height).clamp(0.0, height);
                FaceRegion::new(
                    x1 as u32,
                    y1 as u32,
                    (x2 - x1).max(0.0) as u32,
                    (y2 - y1).max(0.0) as u32,
                )
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    score: f32,
    /// x1, y1, x2, y2 relative to the image size.
    bbox: [f32; 4],
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy NMS: highest score first, drop anything overlapping a kept box by
/// more than `iou_threshold`.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| iou(&k.bbox, &candidate.bbox) <= iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}
