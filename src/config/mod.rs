mod file_config;

pub use file_config::{FileConfig, PlaylistFileConfig, SpotifyFileConfig};

use crate::catalog::spotify::{DEFAULT_ACCOUNTS_BASE_URL, DEFAULT_API_BASE_URL};
use crate::catalog::SpotifyClientConfig;
use crate::playlist::OAuthSettings;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_METRICS_PORT: u16 = 9091;
pub const DEFAULT_BRAND: &str = "kaguya";
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8000/callback";
pub const DEFAULT_MARKET: &str = "US";
pub const DEFAULT_TOKEN_CACHE: &str = ".spotify_cache";
pub const DEFAULT_SPOTIFY_TIMEOUT_SEC: u64 = 10;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub mood_model_path: PathBuf,
    pub face_model_path: PathBuf,
    pub brand: String,
    pub max_image_bytes: usize,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_redirect_uri: String,
    pub spotify_market: String,
    pub token_cache_path: PathBuf,
    pub spotify_timeout_sec: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            logging_level: RequestsLoggingLevel::default(),
            mood_model_path: PathBuf::from("MoodDetector.onnx"),
            face_model_path: PathBuf::from("face_detector.onnx"),
            brand: DEFAULT_BRAND.to_string(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            spotify_client_id: None,
            spotify_client_secret: None,
            spotify_redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            spotify_market: DEFAULT_MARKET.to_string(),
            token_cache_path: PathBuf::from(DEFAULT_TOKEN_CACHE),
            spotify_timeout_sec: DEFAULT_SPOTIFY_TIMEOUT_SEC,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub mood_model_path: PathBuf,
    pub face_model_path: PathBuf,
    /// Prefix of every playlist this server creates (and cleans up).
    pub brand: String,
    pub max_image_bytes: usize,

    pub spotify: SpotifySettings,
    pub playlist: PlaylistSettings,
}

#[derive(Debug, Clone)]
pub struct SpotifySettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub market: String,
    pub token_cache_path: PathBuf,
    pub request_timeout_sec: u64,
    pub api_base_url: String,
    pub accounts_base_url: String,
}

#[derive(Debug, Clone)]
pub struct PlaylistSettings {
    pub fallback_search_url: bool,
}

impl Default for PlaylistSettings {
    fn default() -> Self {
        Self {
            fallback_search_url: true,
        }
    }
}

impl SpotifySettings {
    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }

    pub fn client_config(&self) -> SpotifyClientConfig {
        SpotifyClientConfig {
            api_base_url: self.api_base_url.clone(),
            accounts_base_url: self.accounts_base_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            market: self.market.clone(),
            timeout_sec: self.request_timeout_sec,
        }
    }

    /// OAuth settings, available only when both credentials are set.
    pub fn oauth_settings(&self) -> Option<OAuthSettings> {
        let (client_id, client_secret) = self.credentials()?;
        Some(OAuthSettings {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: self.redirect_uri.clone(),
            accounts_base_url: self.accounts_base_url.clone(),
            token_cache_path: self.token_cache_path.clone(),
            timeout_sec: self.request_timeout_sec,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let mood_model_path = file
            .mood_model_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.mood_model_path.clone());
        let face_model_path = file
            .face_model_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.face_model_path.clone());

        let brand = file.brand.unwrap_or_else(|| cli.brand.clone());
        if brand.trim().is_empty() {
            bail!("brand must not be empty");
        }

        let max_image_bytes = file.max_image_bytes.unwrap_or(cli.max_image_bytes);
        if max_image_bytes == 0 {
            bail!("max_image_bytes must be greater than zero");
        }

        let sp_file = file.spotify.unwrap_or_default();
        let spotify = SpotifySettings {
            client_id: non_empty(sp_file.client_id).or_else(|| non_empty(cli.spotify_client_id.clone())),
            client_secret: non_empty(sp_file.client_secret)
                .or_else(|| non_empty(cli.spotify_client_secret.clone())),
            redirect_uri: sp_file
                .redirect_uri
                .unwrap_or_else(|| cli.spotify_redirect_uri.clone()),
            market: sp_file
                .market
                .unwrap_or_else(|| cli.spotify_market.clone()),
            token_cache_path: sp_file
                .token_cache_path
                .map(PathBuf::from)
                .unwrap_or_else(|| cli.token_cache_path.clone()),
            request_timeout_sec: sp_file
                .request_timeout_sec
                .unwrap_or(cli.spotify_timeout_sec),
            api_base_url: sp_file
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            accounts_base_url: sp_file
                .accounts_base_url
                .unwrap_or_else(|| DEFAULT_ACCOUNTS_BASE_URL.to_string()),
        };
        if spotify.request_timeout_sec == 0 {
            bail!("Spotify request timeout must be greater than zero");
        }

        let pl_file = file.playlist.unwrap_or_default();
        let playlist = PlaylistSettings {
            fallback_search_url: pl_file.fallback_search_url.unwrap_or(true),
        };

        Ok(Self {
            port,
            metrics_port,
            logging_level,
            mood_model_path,
            face_model_path,
            brand,
            max_image_bytes,
            spotify,
            playlist,
        })
    }
}

/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
