//! Kaguya Server Library
//!
//! Mood detection from face images, mapped to Spotify recommendations and
//! playlists. The modules are exposed for the binary and for testing.

pub mod catalog;
pub mod config;
pub mod mood;
pub mod playlist;
pub mod server;
pub mod vision;

// Re-export commonly used types for convenience
pub use mood::{DetectedMood, DetectionResult, MoodLabel};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use vision::VisionModels;
