//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own fake Spotify and token cache.

use super::constants::*;
use super::fake_spotify::FakeSpotify;
use super::fakes::{FakeFaceDetector, FixedMoodModel};
use kaguya_server::catalog::{
    MusicCatalog, MusicRecommender, PlaylistApi, SpotifyClient, SpotifyClientConfig,
};
use kaguya_server::mood::MoodLabel;
use kaguya_server::playlist::{
    OAuthSettings, PlaylistManager, SpotifyOAuth, StoredToken, TokenSource,
};
use kaguya_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use kaguya_server::vision::{FaceDetector, MoodModel, VisionModels};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Options for [`TestServer`]; start from [`TestServer::builder`].
pub struct TestServerBuilder {
    mood: MoodLabel,
    face_detector: bool,
    mood_model: bool,
    spotify_credentials: bool,
    authenticated: bool,
    session_expiring: bool,
    fallback_search_url: bool,
    catalog: Option<Vec<Value>>,
    max_image_bytes: usize,
}

impl TestServerBuilder {
    /// Mood the fake model predicts for every face.
    pub fn mood(mut self, mood: MoodLabel) -> Self {
        self.mood = mood;
        self
    }

    pub fn without_models(mut self) -> Self {
        self.face_detector = false;
        self.mood_model = false;
        self
    }

    pub fn without_mood_model(mut self) -> Self {
        self.mood_model = false;
        self
    }

    /// No client id/secret: no search, no OAuth.
    pub fn without_spotify(mut self) -> Self {
        self.spotify_credentials = false;
        self
    }

    /// Starts with a valid user token in the token cache.
    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    /// Starts with a cached user token that is about to expire and that the
    /// fake Spotify no longer accepts, so the first use has to refresh it.
    pub fn session_expiring_soon(mut self) -> Self {
        self.session_expiring = true;
        self
    }

    pub fn without_fallback_url(mut self) -> Self {
        self.fallback_search_url = false;
        self
    }

    /// Replaces what the fake Spotify returns for searches.
    pub fn catalog(mut self, catalog: Vec<Value>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    /// Spawns the fake Spotify and the server on random ports
    ///
    /// # Panics
    ///
    /// Panics if binding fails or the server doesn't become ready in time.
    pub async fn spawn(self) -> TestServer {
        let spotify = match self.catalog {
            Some(catalog) => FakeSpotify::spawn_with_catalog(catalog).await,
            None => FakeSpotify::spawn().await,
        };
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let token_cache_path = temp_dir.path().join(".spotify_cache");

        if self.session_expiring {
            write_token_cache(&token_cache_path, STALE_USER_TOKEN, 30);
        } else if self.authenticated {
            write_token_cache(&token_cache_path, &format!("{USER_TOKEN_PREFIX}-cached"), 3600);
        }

        let (client_id, client_secret) = if self.spotify_credentials {
            (Some(CLIENT_ID.to_string()), Some(CLIENT_SECRET.to_string()))
        } else {
            (None, None)
        };

        let client = Arc::new(
            SpotifyClient::new(SpotifyClientConfig {
                api_base_url: spotify.api_base_url(),
                accounts_base_url: spotify.base_url.clone(),
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                market: "US".to_string(),
                timeout_sec: REQUEST_TIMEOUT_SECS,
            })
            .expect("Failed to build Spotify client"),
        );

        let recommender = client
            .has_credentials()
            .then(|| Arc::new(MusicRecommender::new(client.clone() as Arc<dyn MusicCatalog>)));

        let oauth = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Some(Arc::new(
                SpotifyOAuth::new(OAuthSettings {
                    client_id,
                    client_secret,
                    redirect_uri: "http://127.0.0.1:8000/callback".to_string(),
                    accounts_base_url: spotify.base_url.clone(),
                    token_cache_path: token_cache_path.clone(),
                    timeout_sec: REQUEST_TIMEOUT_SECS,
                })
                .expect("Failed to set up OAuth"),
            )),
            _ => None,
        };

        let playlist_manager = Arc::new(PlaylistManager::new(
            BRAND,
            oauth.clone().map(|o| o as Arc<dyn TokenSource>),
            client as Arc<dyn PlaylistApi>,
            self.fallback_search_url,
        ));

        let models = VisionModels {
            face_detector: self
                .face_detector
                .then(|| Arc::new(FakeFaceDetector) as Arc<dyn FaceDetector>),
            mood_model: self
                .mood_model
                .then(|| Arc::new(FixedMoodModel { mood: self.mood }) as Arc<dyn MoodModel>),
        };

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            max_image_bytes: self.max_image_bytes,
            spotify_credentials: self.spotify_credentials,
        };
        let app = make_app(config, models, recommender, playlist_manager, oauth);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Server failed");
        });

        let server = TestServer {
            base_url,
            port,
            spotify,
            token_cache_path,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }
}

/// Test server instance with an isolated fake Spotify
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// The fake Spotify the server talks to, for inspecting its calls
    pub spotify: FakeSpotify,

    /// Where the server persists the Spotify user token
    pub token_cache_path: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

fn write_token_cache(path: &std::path::Path, access_token: &str, expires_in: i64) {
    let token = StoredToken {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh-token".to_string()),
        token_type: "Bearer".to_string(),
        scope: "playlist-modify-public".to_string(),
        expires_at: chrono::Utc::now().timestamp() + expires_in,
    };
    std::fs::write(path, serde_json::to_vec(&token).unwrap()).expect("Failed to write token cache");
}

impl TestServer {
    /// Fully featured server: models loaded, Spotify credentials set, no user session.
    pub fn builder() -> TestServerBuilder {
        TestServerBuilder {
            mood: MoodLabel::Happy,
            face_detector: true,
            mood_model: true,
            spotify_credentials: true,
            authenticated: false,
            session_expiring: false,
            fallback_search_url: true,
            catalog: None,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }

    /// Spawns a server with the default options of [`TestServer::builder`]
    pub async fn spawn() -> Self {
        Self::builder().spawn().await
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.replace("http://", "ws://"), path)
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    // Server is ready
                    return;
                }
                _ => {
                    // Server not ready yet, wait and retry
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
