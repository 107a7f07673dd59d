use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub mood_model_path: Option<String>,
    pub face_model_path: Option<String>,
    pub brand: Option<String>,
    pub max_image_bytes: Option<usize>,

    pub spotify: Option<SpotifyFileConfig>,
    pub playlist: Option<PlaylistFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SpotifyFileConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub market: Option<String>,
    pub token_cache_path: Option<String>,
    pub request_timeout_sec: Option<u64>,
    // Only settable here; mostly useful to point at a local fake.
    pub api_base_url: Option<String>,
    pub accounts_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PlaylistFileConfig {
    /// Hand out open.spotify.com search links when no playlist can be created.
    pub fallback_search_url: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
