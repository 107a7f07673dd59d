use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use super::error::{ApiError, ApiResult};
use super::mood_routes::{require_recommender, LimitQuery};
use super::state::{GuardedPlaylistManager, OptionalRecommender, ServerState};
use crate::catalog::{clamp_limit, Track};
use crate::mood::{DetectedMood, MoodLabel};
use crate::playlist::{CleanupError, DeletedPlaylist};

#[derive(Serialize)]
struct PlaylistResponse {
    mood: MoodLabel,
    playlist_url: Option<String>,
    tracks: Vec<Track>,
}

#[derive(Serialize)]
struct CleanupResponse {
    status: &'static str,
    message: String,
    deleted_count: usize,
    deleted_playlists: Vec<DeletedPlaylist>,
}

fn invalid_mood_message() -> String {
    let names: Vec<String> = MoodLabel::ALL
        .iter()
        .map(|m| format!("'{}'", m.as_str()))
        .collect();
    format!("Invalid mood. Valid moods: [{}]", names.join(", "))
}

async fn get_mood_playlist(
    State(recommender): State<OptionalRecommender>,
    State(playlist_manager): State<GuardedPlaylistManager>,
    Path(mood): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<PlaylistResponse>> {
    let recommender = require_recommender(recommender)?;
    let mood: MoodLabel = mood
        .parse()
        .map_err(|_| ApiError::bad_request(invalid_mood_message()))?;

    let tracks = recommender
        .recommend(DetectedMood::Known(mood), clamp_limit(query.limit))
        .await;
    if tracks.is_empty() {
        return Err(ApiError::NotFound(format!("No tracks found for mood: {}", mood)));
    }

    let outcome = playlist_manager.playlist_for_mood(mood, &tracks).await;
    info!("Playlist for {}: {:?}", mood, outcome);

    Ok(Json(PlaylistResponse {
        mood,
        playlist_url: outcome.into_url(),
        tracks,
    }))
}

async fn cleanup(
    State(playlist_manager): State<GuardedPlaylistManager>,
) -> ApiResult<Json<CleanupResponse>> {
    let report = playlist_manager.cleanup().await.map_err(|e| match e {
        CleanupError::NotAuthenticated => ApiError::unavailable(e.to_string()),
        CleanupError::Catalog(e) => ApiError::internal(format!("cleanup failed: {}", e)),
    })?;

    let brand = playlist_manager.brand();
    let deleted_count = report.deleted.len();
    let message = if deleted_count == 0 {
        format!("No {} playlists found to delete", brand)
    } else {
        format!("Successfully deleted {} {} playlists", deleted_count, brand)
    };

    Ok(Json(CleanupResponse {
        status: "success",
        message,
        deleted_count,
        deleted_playlists: report.deleted,
    }))
}

pub fn make_playlist_routes(state: ServerState) -> Router {
    Router::new()
        .route("/playlist/{mood}", get(get_mood_playlist))
        .route("/cleanup", post(cleanup))
        .with_state(state)
}
