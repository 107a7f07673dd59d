//! Spotify authorization-code flow and the persisted user token.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::models::{AccountsError, TokenResponse};
use crate::server::metrics;

pub const SCOPES: &str = "playlist-modify-public playlist-modify-private user-read-private";

/// Refresh the user token when it expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;

/// How long an issued authorization `state` stays redeemable.
const AUTH_STATE_TTL_SECS: i64 = 600;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Invalid or expired authorization code")]
    InvalidGrant,

    #[error("Spotify error: {0}")]
    Provider(String),

    #[error("Request to Spotify accounts failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Token cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token cache is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub accounts_base_url: String,
    pub token_cache_path: PathBuf,
    pub timeout_sec: u64,
}

/// The user session as persisted in the token cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl StoredToken {
    fn from_response(response: TokenResponse, previous_refresh: Option<String>) -> Self {
        StoredToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            token_type: response.token_type,
            scope: response.scope.unwrap_or_else(|| SCOPES.to_string()),
            expires_at: Utc::now().timestamp() + response.expires_in,
        }
    }

    pub fn expires_in(&self) -> i64 {
        (self.expires_at - Utc::now().timestamp()).max(0)
    }

    pub fn needs_refresh(&self) -> bool {
        self.expires_at - Utc::now().timestamp() < REFRESH_MARGIN_SECS
    }
}

/// Anything able to hand out a user access token for playlist calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A currently valid token, or `None` when no user session exists.
    async fn access_token(&self) -> Option<String>;
}

/// Authorization `state` values handed out with the authorize URL, keyed by
/// value with their creation time (unix seconds). Each one is redeemable once.
#[derive(Default)]
pub struct AuthStateStore {
    states: RwLock<HashMap<String, i64>>,
}

impl AuthStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and remembers a new random state.
    pub async fn issue(&self) -> String {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now().timestamp();
        let mut states = self.states.write().await;
        states.retain(|_, created_at| now - *created_at < AUTH_STATE_TTL_SECS);
        states.insert(state.clone(), now);
        state
    }

    /// Removes the state, returning whether it was issued and is still fresh.
    pub async fn take(&self, state: &str) -> bool {
        let created_at = self.states.write().await.remove(state);
        created_at.is_some_and(|created_at| {
            Utc::now().timestamp() - created_at < AUTH_STATE_TTL_SECS
        })
    }
}

pub struct SpotifyOAuth {
    client: reqwest::Client,
    settings: OAuthSettings,
    token: RwLock<Option<StoredToken>>,
    states: AuthStateStore,
}

impl SpotifyOAuth {
    /// Creates the OAuth helper and loads a previously cached token, if any.
    pub fn new(settings: OAuthSettings) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_sec))
            .build()?;

        let token = match load_token(&settings.token_cache_path) {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    "Ignoring unreadable token cache {}: {}",
                    settings.token_cache_path.display(),
                    e
                );
                None
            }
        };
        if token.is_some() {
            info!(
                "Loaded cached Spotify token from {}",
                settings.token_cache_path.display()
            );
        }

        let settings = OAuthSettings {
            accounts_base_url: settings.accounts_base_url.trim_end_matches('/').to_string(),
            ..settings
        };

        Ok(Self {
            client,
            settings,
            token: RwLock::new(token),
            states: AuthStateStore::new(),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.settings.redirect_uri
    }

    /// URL the user visits to grant playlist access.
    pub async fn authorize_url(&self) -> String {
        let state = self.states.issue().await;
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.settings.accounts_base_url,
            urlencoding::encode(&self.settings.client_id),
            urlencoding::encode(&self.settings.redirect_uri),
            urlencoding::encode(SCOPES),
            state
        )
    }

    /// Checks the `state` echoed back to the callback. A state is accepted once.
    pub async fn redeem_state(&self, state: &str) -> bool {
        self.states.take(state).await
    }

    /// Exchanges an authorization code for a user token and persists it.
    pub async fn exchange_code(&self, code: &str) -> Result<StoredToken, OAuthError> {
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
            ])
            .await?;

        let token = StoredToken::from_response(response, None);
        self.persist(&token).await?;
        *self.token.write().await = Some(token.clone());
        info!("Stored new Spotify user token");
        Ok(token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken, OAuthError> {
        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        Ok(StoredToken::from_response(
            response,
            Some(refresh_token.to_string()),
        ))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, OAuthError> {
        let url = format!("{}/api/token", self.settings.accounts_base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        metrics::record_spotify_call("user_token", status.is_success());
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<AccountsError>(&body) {
            Ok(err) if err.error == "invalid_grant" => Err(OAuthError::InvalidGrant),
            Ok(err) => Err(OAuthError::Provider(match err.error_description {
                Some(description) => format!("{} ({})", err.error, description),
                None => err.error,
            })),
            Err(_) => Err(OAuthError::Provider(format!("http status {}", status))),
        }
    }

    async fn persist(&self, token: &StoredToken) -> Result<(), OAuthError> {
        let json = serde_json::to_vec_pretty(token)?;
        tokio::fs::write(&self.settings.token_cache_path, json).await?;
        Ok(())
    }

    pub async fn cached_token(&self) -> Option<StoredToken> {
        self.token.read().await.clone()
    }
}

fn load_token(path: &Path) -> Result<Option<StoredToken>, OAuthError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(path)?;
    Ok(Some(serde_json::from_slice(&data)?))
}

#[async_trait]
impl TokenSource for SpotifyOAuth {
    async fn access_token(&self) -> Option<String> {
        {
            let current = self.token.read().await;
            let token = current.as_ref()?;
            if !token.needs_refresh() {
                return Some(token.access_token.clone());
            }
        }

        let mut current = self.token.write().await;
        // Another caller may have refreshed while this one waited for the lock.
        let token = current.as_ref()?;
        if !token.needs_refresh() {
            return Some(token.access_token.clone());
        }
        let Some(refresh_token) = token.refresh_token.clone() else {
            debug!("Spotify user token expired and has no refresh token");
            return None;
        };

        debug!("Refreshing Spotify user token");
        let refreshed = match self.refresh(&refresh_token).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to refresh Spotify user token: {}", e);
                return None;
            }
        };
        if let Err(e) = self.persist(&refreshed).await {
            warn!("Failed to persist refreshed Spotify token: {}", e);
        }
        let access_token = refreshed.access_token.clone();
        *current = Some(refreshed);
        Some(access_token)
    }
}
