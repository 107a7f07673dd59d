use super::RequestsLoggingLevel;
use crate::config::DEFAULT_MAX_IMAGE_BYTES;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Upper bound for request bodies carrying images (JSON or multipart).
    pub max_image_bytes: usize,
    /// Both Spotify client id and secret were configured.
    pub spotify_credentials: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 8000,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            spotify_credentials: false,
        }
    }
}
