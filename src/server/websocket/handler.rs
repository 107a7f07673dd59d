//! WebSocket route handler.
//!
//! Handles the upgrade, the per-frame detection loop and cleanup.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::messages::{errors, FrameMessage, FrameResult, ServerMessage};
use crate::catalog::MusicRecommender;
use crate::mood::DetectedMood;
use crate::server::metrics;
use crate::server::mood_routes::{timed_detection, MODELS_NOT_LOADED};
use crate::server::state::{OptionalMoodDetector, OptionalRecommender};
use crate::vision::{decode_base64_image, MoodDetector};

/// Tracks searched for a frame asking for recommendations.
const STREAM_SEARCH_LIMIT: u32 = 10;
/// Tracks actually sent back.
const STREAM_RECOMMENDATIONS: usize = 5;
const OUTGOING_BUFFER: usize = 16;

/// State needed for WebSocket handling (internal).
struct WsState {
    mood_detector: OptionalMoodDetector,
    recommender: OptionalRecommender,
}

/// Route handler for `GET /ws/video-mood`.
pub async fn video_mood_handler(
    ws: WebSocketUpgrade,
    State(mood_detector): State<OptionalMoodDetector>,
    State(recommender): State<OptionalRecommender>,
) -> Response {
    let state = Arc::new(WsState {
        mood_detector,
        recommender,
    });
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    metrics::ws_connection_opened();
    debug!("Video mood WebSocket connected");

    let (ws_sink, ws_stream) = socket.split();
    let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_BUFFER);

    let outgoing_handle = tokio::spawn(forward_outgoing(ws_sink, outgoing_rx));

    process_incoming(ws_stream, outgoing_tx, &state).await;

    // Dropping the sender above lets the forwarder flush and finish.
    if let Err(e) = outgoing_handle.await {
        debug!("WebSocket forwarder ended abnormally: {}", e);
    }
    metrics::ws_connection_closed();
    info!("Client disconnected from video mood WebSocket");
}

/// Forward messages from the outgoing channel to the WebSocket.
async fn forward_outgoing(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outgoing_rx: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = outgoing_rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to serialize WebSocket message: {}", e);
            }
        }
    }
}

/// Process incoming frames, one at a time.
async fn process_incoming(
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    outgoing_tx: mpsc::Sender<ServerMessage>,
    state: &WsState,
) {
    while let Some(result) = ws_stream.next().await {
        let reply = match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<FrameMessage>(&text) {
                Ok(frame) => handle_frame(frame, state).await,
                Err(e) => {
                    debug!("Failed to parse client message: {}", e);
                    ServerMessage::error(errors::INVALID_MESSAGE)
                }
            },
            Ok(Message::Binary(_)) => {
                debug!("Received binary message, ignoring");
                continue;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        };

        if outgoing_tx.send(reply).await.is_err() {
            break;
        }
    }
}

async fn handle_frame(frame: FrameMessage, state: &WsState) -> ServerMessage {
    let wants_recommendations = frame.wants_recommendations();
    let Some(image) = frame.image else {
        return ServerMessage::error(errors::NO_IMAGE);
    };
    let Some(detector) = state.mood_detector.as_ref() else {
        return ServerMessage::error(MODELS_NOT_LOADED);
    };

    match detect_frame(detector, &image).await {
        Ok(mut result) => {
            if wants_recommendations {
                if let Some(mood) = result.mood {
                    result.recommendations =
                        Some(recommend(state.recommender.as_deref(), mood).await);
                }
            }
            result.timestamp = frame.timestamp;
            ServerMessage::Frame(result)
        }
        Err(e) => {
            error!("Error processing video frame: {}", e);
            ServerMessage::error(errors::FRAME_FAILED)
        }
    }
}

async fn detect_frame(
    detector: &Arc<MoodDetector>,
    image: &str,
) -> Result<FrameResult, Box<dyn std::error::Error + Send + Sync>> {
    let image = decode_base64_image(image)?;
    let detection = timed_detection(detector, image, "stream").await?;
    Ok(FrameResult::new(detection, serde_json::Value::Null))
}

async fn recommend(
    recommender: Option<&MusicRecommender>,
    mood: DetectedMood,
) -> Vec<crate::catalog::Track> {
    let Some(recommender) = recommender else {
        return vec![];
    };
    let mut tracks = recommender.recommend(mood, STREAM_SEARCH_LIMIT).await;
    tracks.truncate(STREAM_RECOMMENDATIONS);
    tracks
}
