//! Real-time mood detection over a WebSocket video stream.

mod handler;
pub mod messages;

pub use handler::video_mood_handler;
