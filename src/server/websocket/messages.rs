//! WebSocket message types for the video mood stream.
//!
//! Every inbound text frame carries one encoded video frame; the server
//! answers each of them with exactly one [`ServerMessage`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::Track;
use crate::mood::{DetectedMood, DetectionResult};

/// Client -> Server frame.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FrameMessage {
    /// Base64 image, optionally as a data URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Opaque client value echoed back in the reply.
    #[serde(default)]
    pub timestamp: Value,
    /// Absent and `null` both mean no recommendations.
    #[serde(default)]
    pub include_playlist: Option<bool>,
}

impl FrameMessage {
    pub fn wants_recommendations(&self) -> bool {
        self.include_playlist.unwrap_or(false)
    }
}

/// Detection result for one frame.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FrameResult {
    /// `None` when no face was found in the frame.
    pub mood: Option<DetectedMood>,
    pub confidence: f32,
    pub timestamp: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Track>>,
}

impl FrameResult {
    pub fn new(detection: Option<DetectionResult>, timestamp: Value) -> Self {
        Self {
            mood: detection.map(|d| d.mood),
            confidence: detection.map(|d| d.confidence).unwrap_or(0.0),
            timestamp,
            recommendations: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorMessage {
    pub error: String,
}

/// Server -> Client message.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    Frame(FrameResult),
    Error(ErrorMessage),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            error: message.into(),
        })
    }
}

/// Inline error texts.
pub mod errors {
    pub const NO_IMAGE: &str = "No image data provided";
    pub const INVALID_MESSAGE: &str = "Invalid message";
    pub const FRAME_FAILED: &str = "Failed to process frame";
}
