//! Wire shapes of the Spotify Web API responses we consume.
//!
//! Only the fields the server reads are modelled; everything else in the
//! payloads is ignored. Fields Spotify documents as nullable are `Option`s.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogImage {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogArtist {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogAlbum {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub images: Vec<CatalogImage>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<CatalogArtist>,
    #[serde(default)]
    pub album: Option<CatalogAlbum>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub popularity: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: Option<TrackPage>,
}

/// Search result page. Spotify occasionally returns `null` entries.
#[derive(Debug, Deserialize)]
pub struct TrackPage {
    #[serde(default)]
    pub items: Vec<Option<CatalogTrack>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Followers {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub followers: Option<Followers>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl PlaylistSummary {
    pub fn url(&self) -> String {
        self.external_urls
            .spotify
            .clone()
            .unwrap_or_else(|| format!("https://open.spotify.com/playlist/{}", self.id))
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaylistPage {
    #[serde(default)]
    pub items: Vec<Option<PlaylistSummary>>,
}

#[derive(Debug, Serialize)]
pub struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub public: bool,
}

#[derive(Debug, Serialize)]
pub struct AddTracksRequest<'a> {
    pub uris: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Error body of the accounts service (`{"error": "...", "error_description": "..."}`).
#[derive(Debug, Deserialize)]
pub struct AccountsError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}
