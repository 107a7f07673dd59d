//! HTTP client for the Spotify Web API.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{RequestBuilder, Response};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::models::{
    AddTracksRequest, CatalogTrack, CreatePlaylistRequest, PlaylistPage, PlaylistSummary,
    SearchResponse, TokenResponse, UserProfile,
};
use super::{CatalogError, CreatedPlaylist, MusicCatalog, PlaylistApi, PlaylistListing};
use crate::server::metrics;

pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";

/// Refresh the app token this long before Spotify would expire it.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct SpotifyClientConfig {
    pub api_base_url: String,
    pub accounts_base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub market: String,
    pub timeout_sec: u64,
}

impl Default for SpotifyClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            accounts_base_url: DEFAULT_ACCOUNTS_BASE_URL.to_string(),
            client_id: None,
            client_secret: None,
            market: "US".to_string(),
            timeout_sec: 10,
        }
    }
}

struct AppToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Spotify Web API client.
///
/// Search uses an app token from the client-credentials grant, cached until it
/// is about to expire. The [`PlaylistApi`] calls take a user token from the
/// OAuth session instead.
pub struct SpotifyClient {
    client: reqwest::Client,
    api_base_url: String,
    accounts_base_url: String,
    credentials: Option<(String, String)>,
    market: String,
    app_token: RwLock<Option<AppToken>>,
}

impl SpotifyClient {
    pub fn new(config: SpotifyClientConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()?;

        let credentials = match (config.client_id, config.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        };

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            accounts_base_url: config.accounts_base_url.trim_end_matches('/').to_string(),
            credentials,
            market: config.market,
            app_token: RwLock::new(None),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Returns a valid client-credentials token, fetching a new one if the
    /// cached token is missing or about to expire.
    async fn app_token(&self) -> Result<String, CatalogError> {
        {
            let cached = self.app_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Utc::now() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.app_token.write().await;
        // Another task may have refreshed it while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let (client_id, client_secret) = self
            .credentials
            .as_ref()
            .ok_or(CatalogError::MissingCredentials)?;

        debug!("Requesting new Spotify client-credentials token");
        let url = format!("{}/api/token", self.accounts_base_url);
        let request = self
            .client
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")]);
        let token: TokenResponse = send("client_token", request).await?.json().await?;

        let lifetime = (token.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0);
        *cached = Some(AppToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + ChronoDuration::seconds(lifetime),
        });
        Ok(token.access_token)
    }
}

/// Sends a request and turns non-2xx responses into [`CatalogError::Status`].
async fn send(operation: &str, request: RequestBuilder) -> Result<Response, CatalogError> {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            metrics::record_spotify_call(operation, false);
            return Err(e.into());
        }
    };

    let status = response.status();
    if status.is_success() {
        metrics::record_spotify_call(operation, true);
        return Ok(response);
    }

    metrics::record_spotify_call(operation, false);
    let body = response.text().await.unwrap_or_default();
    warn!("Spotify {} failed with status {}: {}", operation, status, body);
    Err(CatalogError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl MusicCatalog for SpotifyClient {
    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<CatalogTrack>, CatalogError> {
        let token = self.app_token().await?;
        let url = format!("{}/search", self.api_base_url);
        let limit = limit.to_string();
        let request = self.client.get(&url).bearer_auth(token).query(&[
            ("q", query),
            ("type", "track"),
            ("limit", limit.as_str()),
            ("market", self.market.as_str()),
        ]);

        let response: SearchResponse = send("search", request).await?.json().await?;
        let items = response
            .tracks
            .ok_or(CatalogError::MissingField("tracks"))?
            .items;
        Ok(items.into_iter().flatten().collect())
    }
}

#[async_trait]
impl PlaylistApi for SpotifyClient {
    async fn current_user(&self, token: &str) -> Result<UserProfile, CatalogError> {
        let url = format!("{}/me", self.api_base_url);
        let request = self.client.get(&url).bearer_auth(token);
        Ok(send("current_user", request).await?.json().await?)
    }

    async fn create_playlist(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<CreatedPlaylist, CatalogError> {
        let url = format!(
            "{}/users/{}/playlists",
            self.api_base_url,
            urlencoding::encode(user_id)
        );
        let request = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&CreatePlaylistRequest {
                name,
                description,
                public,
            });
        let playlist: PlaylistSummary = send("create_playlist", request).await?.json().await?;
        Ok(CreatedPlaylist {
            url: playlist.url(),
            id: playlist.id,
        })
    }

    async fn add_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), CatalogError> {
        let url = format!("{}/playlists/{}/tracks", self.api_base_url, playlist_id);
        let request = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&AddTracksRequest { uris });
        send("add_tracks", request).await?;
        Ok(())
    }

    async fn list_playlists(
        &self,
        token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistListing, CatalogError> {
        let url = format!("{}/me/playlists", self.api_base_url);
        let request = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("limit", limit), ("offset", offset)]);
        let page: PlaylistPage = send("list_playlists", request).await?.json().await?;
        Ok(PlaylistListing {
            page_len: page.items.len(),
            playlists: page.items.into_iter().flatten().collect(),
        })
    }

    async fn unfollow_playlist(&self, token: &str, playlist_id: &str) -> Result<(), CatalogError> {
        let url = format!("{}/playlists/{}/followers", self.api_base_url, playlist_id);
        let request = self.client.delete(&url).bearer_auth(token);
        send("unfollow_playlist", request).await?;
        Ok(())
    }
}
