//! Image based mood detection routes.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    routing::post,
    Json, Router,
};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{ApiError, ApiResult};
use super::metrics;
use super::state::{GuardedPlaylistManager, OptionalMoodDetector, OptionalRecommender, ServerState};
use crate::catalog::{clamp_limit, MusicRecommender, Track};
use crate::mood::{DetectedMood, DetectionResult};
use crate::vision::{decode_base64_image, decode_image_bytes, MoodDetector};

pub(super) const MODELS_NOT_LOADED: &str = "Mood detection models not loaded";
pub(super) const CATALOG_NOT_INITIALIZED: &str = "Spotify client not initialized";
const NO_FACE: &str = "No face detected in image";

#[derive(Deserialize)]
struct DetectMoodBody {
    image_base64: String,
}

#[derive(Deserialize)]
pub(super) struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
struct MoodDetectionResponse {
    mood: DetectedMood,
    confidence: f32,
    playlist_url: Option<String>,
    recommendations: Vec<Track>,
}

#[derive(Serialize)]
struct UploadResponse {
    mood: DetectedMood,
    confidence: f32,
    filename: Option<String>,
}

pub(super) fn require_detector(detector: OptionalMoodDetector) -> ApiResult<Arc<MoodDetector>> {
    detector.ok_or_else(|| ApiError::unavailable(MODELS_NOT_LOADED))
}

pub(super) fn require_recommender(
    recommender: OptionalRecommender,
) -> ApiResult<Arc<MusicRecommender>> {
    recommender.ok_or_else(|| ApiError::unavailable(CATALOG_NOT_INITIALIZED))
}

/// Runs detection off the async workers and records how long it took.
pub(super) async fn timed_detection(
    detector: &Arc<MoodDetector>,
    image: RgbImage,
    source: &str,
) -> Result<Option<DetectionResult>, crate::vision::VisionError> {
    let started = Instant::now();
    let result = detector.detect_blocking(image).await?;
    let label = result.map(|r| r.mood.as_str()).unwrap_or("none");
    metrics::record_mood_detection(source, label, started.elapsed());
    Ok(result)
}

async fn detect_face_mood(
    detector: &Arc<MoodDetector>,
    image: RgbImage,
    source: &str,
) -> ApiResult<DetectionResult> {
    timed_detection(detector, image, source)
        .await?
        .ok_or_else(|| ApiError::bad_request(NO_FACE))
}

async fn detect_mood(
    State(detector): State<OptionalMoodDetector>,
    Json(body): Json<DetectMoodBody>,
) -> ApiResult<Json<MoodDetectionResponse>> {
    let detector = require_detector(detector)?;
    let image = decode_base64_image(&body.image_base64)?;
    let result = detect_face_mood(&detector, image, "detect").await?;

    Ok(Json(MoodDetectionResponse {
        mood: result.mood,
        confidence: result.confidence,
        playlist_url: None,
        recommendations: vec![],
    }))
}

async fn mood_and_playlist(
    State(detector): State<OptionalMoodDetector>,
    State(recommender): State<OptionalRecommender>,
    State(playlist_manager): State<GuardedPlaylistManager>,
    Query(query): Query<LimitQuery>,
    Json(body): Json<DetectMoodBody>,
) -> ApiResult<Json<MoodDetectionResponse>> {
    let detector = require_detector(detector)?;
    let recommender = require_recommender(recommender)?;

    let image = decode_base64_image(&body.image_base64)?;
    let result = detect_face_mood(&detector, image, "mood_and_playlist").await?;

    let tracks = recommender
        .recommend(result.mood, clamp_limit(query.limit))
        .await;

    let playlist_url = match result.mood.label() {
        Some(label) if !tracks.is_empty() => {
            let outcome = playlist_manager.playlist_for_mood(label, &tracks).await;
            debug!("Playlist outcome for {}: {:?}", label, outcome);
            outcome.into_url()
        }
        Some(label) => {
            warn!("No tracks found for mood '{}'", label);
            None
        }
        None => None,
    };

    Ok(Json(MoodDetectionResponse {
        mood: result.mood,
        confidence: result.confidence,
        playlist_url,
        recommendations: tracks,
    }))
}

async fn upload_image(
    State(detector): State<OptionalMoodDetector>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| ApiError::Validation(e.body_text()))?;

    let mut upload: Option<(Option<String>, Vec<u8>)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        match field.bytes().await {
            Ok(bytes) => {
                upload = Some((filename, bytes.to_vec()));
                break;
            }
            Err(e) => return Err(ApiError::Validation(format!("Failed to read file: {}", e))),
        }
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::Validation("Missing file field 'file'".to_string()));
    };
    let detector = require_detector(detector)?;
    info!(
        "Received upload {:?} ({} bytes)",
        filename.as_deref().unwrap_or("<unnamed>"),
        bytes.len()
    );

    let image = decode_image_bytes(&bytes)?;
    let result = detect_face_mood(&detector, image, "upload").await?;

    Ok(Json(UploadResponse {
        mood: result.mood,
        confidence: result.confidence,
        filename,
    }))
}

pub fn make_mood_routes(state: ServerState) -> Router {
    Router::new()
        .route("/detect-mood", post(detect_mood))
        .route("/mood-and-playlist", post(mood_and_playlist))
        .route("/upload-image", post(upload_image))
        .with_state(state)
}
