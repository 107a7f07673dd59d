//! A minimal fake of the Spotify accounts service and Web API.
//!
//! Serves both `/api/token` and the `/v1/...` endpoints the server uses from a
//! single axum app on a random port, and records what it was asked to do.

use super::constants::*;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePlaylist {
    pub id: String,
    pub name: String,
    pub tracks: Vec<String>,
}

#[derive(Default)]
pub struct FakeSpotifyState {
    /// Items returned by every search, in order (duplicates on purpose).
    pub catalog: Mutex<Vec<Value>>,
    pub playlists: Mutex<Vec<FakePlaylist>>,
    pub unfollowed: Mutex<Vec<String>>,
    pub search_queries: Mutex<Vec<HashMap<String, String>>>,
    /// Null items listed ahead of the playlists, as Spotify does for
    /// playlists it can no longer resolve.
    pub null_playlists: AtomicUsize,
    pub playlists_created: AtomicUsize,
    pub issued_user_tokens: AtomicUsize,
    pub refresh_requests: AtomicUsize,
    /// Bearer token each playlist was created with, in creation order.
    pub creation_tokens: Mutex<Vec<String>>,
}

pub struct FakeSpotify {
    /// Base URL of the accounts endpoints (`{base}/api/token`)
    pub base_url: String,
    pub state: Arc<FakeSpotifyState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

/// Builds a search result item in the shape Spotify returns it.
pub fn catalog_track(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Song {id}"),
        "artists": [{"name": format!("Artist {id}")}, {"name": "Featured"}],
        "album": {
            "name": format!("Album {id}"),
            "images": [
                {"url": format!("https://img.example/{id}/640")},
                {"url": format!("https://img.example/{id}/300")},
            ],
        },
        "preview_url": null,
        "external_urls": {"spotify": format!("https://open.spotify.com/track/{id}")},
        "duration_ms": 200000,
        "popularity": 50,
    })
}

/// Ten search items covering eight distinct tracks.
pub fn default_catalog() -> Vec<Value> {
    ["t1", "t2", "t1", "t3", "t4", "t2", "t5", "t6", "t7", "t8"]
        .iter()
        .map(|id| catalog_track(id))
        .collect()
}

impl FakeSpotify {
    pub async fn spawn() -> Self {
        Self::spawn_with_catalog(default_catalog()).await
    }

    pub async fn spawn_with_catalog(catalog: Vec<Value>) -> Self {
        let state = Arc::new(FakeSpotifyState {
            catalog: Mutex::new(catalog),
            ..Default::default()
        });

        let app = Router::new()
            .route("/api/token", post(token))
            .route("/v1/search", get(search))
            .route("/v1/me", get(me))
            .route("/v1/me/playlists", get(list_playlists))
            .route("/v1/users/{user_id}/playlists", post(create_playlist))
            .route("/v1/playlists/{id}/tracks", post(add_tracks))
            .route("/v1/playlists/{id}/followers", delete(unfollow))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake Spotify");
        let port = listener.local_addr().expect("No local address").port();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Fake Spotify failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn api_base_url(&self) -> String {
        format!("{}/v1", self.base_url)
    }

    /// Puts a playlist on the fake account, as if created elsewhere.
    pub fn add_playlist(&self, id: &str, name: &str) {
        self.state.playlists.lock().unwrap().push(FakePlaylist {
            id: id.to_string(),
            name: name.to_string(),
            tracks: vec![],
        });
    }

    /// Lists an unresolvable (null) entry before all playlists.
    pub fn add_null_playlist(&self) {
        self.state.null_playlists.fetch_add(1, Ordering::SeqCst);
    }

    pub fn playlists_created(&self) -> usize {
        self.state.playlists_created.load(Ordering::SeqCst)
    }

    pub fn refresh_requests(&self) -> usize {
        self.state.refresh_requests.load(Ordering::SeqCst)
    }

    pub fn creation_tokens(&self) -> Vec<String> {
        self.state.creation_tokens.lock().unwrap().clone()
    }

    pub fn playlist_names(&self) -> Vec<String> {
        self.state
            .playlists
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    pub fn playlist(&self, id: &str) -> Option<FakePlaylist> {
        self.state
            .playlists
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn search_queries(&self) -> Vec<HashMap<String, String>> {
        self.state.search_queries.lock().unwrap().clone()
    }
}

impl Drop for FakeSpotify {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"status": 401, "message": "Invalid access token"}})),
    )
        .into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn is_user_token(headers: &HeaderMap) -> bool {
    bearer(headers).is_some_and(|t| t.starts_with(USER_TOKEN_PREFIX))
}

async fn token(
    State(state): State<Arc<FakeSpotifyState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let user_token = || {
        let n = state.issued_user_tokens.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{USER_TOKEN_PREFIX}-{n}")
    };
    match form.get("grant_type").map(String::as_str) {
        Some("client_credentials") => Json(json!({
            "access_token": APP_TOKEN,
            "token_type": "Bearer",
            "expires_in": 3600,
        }))
        .into_response(),
        Some("authorization_code") if form.get("code").map(String::as_str) == Some(VALID_AUTH_CODE) => {
            Json(json!({
                "access_token": user_token(),
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-token",
                "scope": "playlist-modify-public playlist-modify-private user-read-private",
            }))
            .into_response()
        }
        Some("authorization_code") => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid authorization code"})),
        )
            .into_response(),
        Some("refresh_token") => {
            state.refresh_requests.fetch_add(1, Ordering::SeqCst);
            // Slow enough for concurrent callers to overlap.
            tokio::time::sleep(Duration::from_millis(50)).await;
            Json(json!({
                "access_token": user_token(),
                "token_type": "Bearer",
                "expires_in": 3600,
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unsupported_grant_type"})),
        )
            .into_response(),
    }
}

async fn search(
    State(state): State<Arc<FakeSpotifyState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if bearer(&headers) != Some(APP_TOKEN) {
        return unauthorized();
    }
    let limit: usize = query
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(20);
    state.search_queries.lock().unwrap().push(query);

    let items: Vec<Value> = state
        .catalog
        .lock()
        .unwrap()
        .iter()
        .take(limit)
        .cloned()
        .collect();
    Json(json!({"tracks": {"items": items}})).into_response()
}

async fn me(headers: HeaderMap) -> Response {
    if !is_user_token(&headers) {
        return unauthorized();
    }
    Json(json!({
        "id": SPOTIFY_USER_ID,
        "display_name": SPOTIFY_USER_NAME,
        "email": SPOTIFY_USER_EMAIL,
        "country": "US",
        "product": "premium",
        "followers": {"total": 3},
    }))
    .into_response()
}

fn playlist_json(playlist: &FakePlaylist) -> Value {
    json!({
        "id": playlist.id,
        "name": playlist.name,
        "external_urls": {"spotify": format!("https://open.spotify.com/playlist/{}", playlist.id)},
    })
}

#[derive(Deserialize)]
struct Page {
    limit: usize,
    offset: usize,
}

async fn list_playlists(
    State(state): State<Arc<FakeSpotifyState>>,
    headers: HeaderMap,
    Query(page): Query<Page>,
) -> Response {
    if !is_user_token(&headers) {
        return unauthorized();
    }
    let nulls = state.null_playlists.load(Ordering::SeqCst);
    let playlists = state.playlists.lock().unwrap();
    let items: Vec<Value> = std::iter::repeat(Value::Null)
        .take(nulls)
        .chain(playlists.iter().map(playlist_json))
        .skip(page.offset)
        .take(page.limit)
        .collect();
    Json(json!({"items": items})).into_response()
}

#[derive(Deserialize)]
struct NewPlaylist {
    name: String,
    #[allow(dead_code)]
    description: String,
    #[allow(dead_code)]
    public: bool,
}

async fn create_playlist(
    State(state): State<Arc<FakeSpotifyState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(body): Json<NewPlaylist>,
) -> Response {
    if !is_user_token(&headers) {
        return unauthorized();
    }
    assert_eq!(user_id, SPOTIFY_USER_ID);
    if let Some(token) = bearer(&headers) {
        state.creation_tokens.lock().unwrap().push(token.to_string());
    }

    let n = state.playlists_created.fetch_add(1, Ordering::SeqCst) + 1;
    // Wide enough for concurrent callers to pile up behind the first one.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let playlist = FakePlaylist {
        id: format!("pl{n}"),
        name: body.name,
        tracks: vec![],
    };
    let response = playlist_json(&playlist);
    state.playlists.lock().unwrap().push(playlist);
    (StatusCode::CREATED, Json(response)).into_response()
}

#[derive(Deserialize)]
struct TrackUris {
    uris: Vec<String>,
}

async fn add_tracks(
    State(state): State<Arc<FakeSpotifyState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TrackUris>,
) -> Response {
    if !is_user_token(&headers) {
        return unauthorized();
    }
    let mut playlists = state.playlists.lock().unwrap();
    match playlists.iter_mut().find(|p| p.id == id) {
        Some(playlist) => {
            playlist.tracks.extend(body.uris);
            (StatusCode::CREATED, Json(json!({"snapshot_id": "snap"}))).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn unfollow(
    State(state): State<Arc<FakeSpotifyState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !is_user_token(&headers) {
        return unauthorized();
    }
    state.playlists.lock().unwrap().retain(|p| p.id != id);
    state.unfollowed.lock().unwrap().push(id);
    StatusCode::OK.into_response()
}
