use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use super::{
    log_requests, metrics, mood_routes::make_mood_routes, playlist_routes::make_playlist_routes,
    spotify_routes::make_spotify_routes, state::*, websocket::video_mood_handler, ServerConfig,
};
use crate::catalog::MusicRecommender;
use crate::mood::MoodLabel;
use crate::playlist::{PlaylistManager, SpotifyOAuth};
use crate::vision::VisionModels;

const SERVICE_NAME: &str = "Kaguya Music Mood API";

#[derive(Serialize)]
struct ServerInfo {
    message: &'static str,
    version: &'static str,
    hash: String,
    uptime: String,
    endpoints: BTreeMap<&'static str, &'static str>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    mood_model_loaded: bool,
    face_detector_loaded: bool,
    spotify_search_available: bool,
    spotify_playlist_creation: bool,
}

#[derive(Serialize)]
struct MoodsResponse {
    moods: Vec<MoodLabel>,
    mood_descriptions: BTreeMap<&'static str, &'static str>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> Json<ServerInfo> {
    let endpoints = BTreeMap::from([
        ("health", "/health"),
        ("moods", "/moods"),
        ("detect_mood", "/detect-mood"),
        ("upload_image", "/upload-image"),
        ("get_playlist", "/playlist/{mood}"),
        ("mood_and_playlist", "/mood-and-playlist"),
        ("spotify_setup", "/spotify-setup"),
        ("spotify_auth_url", "/spotify-auth-url"),
        ("spotify_callback", "/callback"),
        ("spotify_token", "/spotify-token"),
        ("cleanup", "/cleanup"),
        ("video_mood_stream", "/ws/video-mood"),
    ]);
    Json(ServerInfo {
        message: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        hash: state.hash.clone(),
        uptime: format_uptime(state.start_time.elapsed()),
        endpoints,
    })
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let playlist_creation = state.playlist_manager.authenticated_user().await.is_some();
    Json(HealthResponse {
        status: "healthy",
        mood_model_loaded: state.mood_model_loaded,
        face_detector_loaded: state.face_detector_loaded,
        spotify_search_available: state.recommender.is_some(),
        spotify_playlist_creation: playlist_creation,
    })
}

async fn moods() -> Json<MoodsResponse> {
    Json(MoodsResponse {
        moods: MoodLabel::ALL.to_vec(),
        mood_descriptions: MoodLabel::ALL
            .iter()
            .map(|m| (m.as_str(), m.description()))
            .collect(),
    })
}

impl ServerState {
    fn new(
        config: ServerConfig,
        models: &VisionModels,
        recommender: Option<Arc<MusicRecommender>>,
        playlist_manager: Arc<PlaylistManager>,
        oauth: Option<Arc<SpotifyOAuth>>,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            hash: env!("GIT_HASH").to_owned(),
            face_detector_loaded: models.face_detector_loaded(),
            mood_model_loaded: models.mood_model_loaded(),
            mood_detector: models.detector().map(Arc::new),
            recommender,
            playlist_manager,
            oauth,
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    models: VisionModels,
    recommender: Option<Arc<MusicRecommender>>,
    playlist_manager: Arc<PlaylistManager>,
    oauth: Option<Arc<SpotifyOAuth>>,
) -> Router {
    let body_limit = config.max_image_bytes;
    let state = ServerState::new(config, &models, recommender, playlist_manager, oauth);

    let home_router: Router = Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/moods", get(moods))
        .route("/ws/video-mood", get(video_mood_handler))
        .with_state(state.clone());

    home_router
        .merge(make_mood_routes(state.clone()))
        .merge(make_playlist_routes(state.clone()))
        .merge(make_spotify_routes(state.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(state, log_requests))
}

/// Router serving the Prometheus text exposition.
pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(
    config: ServerConfig,
    metrics_port: u16,
    models: VisionModels,
    recommender: Option<Arc<MusicRecommender>>,
    playlist_manager: Arc<PlaylistManager>,
    oauth: Option<Arc<SpotifyOAuth>>,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, models, recommender, playlist_manager, oauth);

    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, make_metrics_app()).await {
            error!("Metrics server stopped: {}", e);
        }
    });
    info!("Metrics available at port {}!", metrics_port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Ready to serve at port {}!", port);

    Ok(axum::serve(listener, app).await?)
}
