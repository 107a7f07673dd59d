use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::MusicRecommender;
use crate::playlist::{PlaylistManager, SpotifyOAuth};
use crate::vision::MoodDetector;

use super::ServerConfig;

pub type OptionalMoodDetector = Option<Arc<MoodDetector>>;
pub type OptionalRecommender = Option<Arc<MusicRecommender>>;
pub type GuardedPlaylistManager = Arc<PlaylistManager>;
pub type OptionalSpotifyOAuth = Option<Arc<SpotifyOAuth>>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub face_detector_loaded: bool,
    pub mood_model_loaded: bool,
    /// `None` when the face detector or the mood model failed to load.
    pub mood_detector: OptionalMoodDetector,
    /// `None` when no Spotify client credentials are configured.
    pub recommender: OptionalRecommender,
    pub playlist_manager: GuardedPlaylistManager,
    pub oauth: OptionalSpotifyOAuth,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for OptionalMoodDetector {
    fn from_ref(input: &ServerState) -> Self {
        input.mood_detector.clone()
    }
}

impl FromRef<ServerState> for OptionalRecommender {
    fn from_ref(input: &ServerState) -> Self {
        input.recommender.clone()
    }
}

impl FromRef<ServerState> for GuardedPlaylistManager {
    fn from_ref(input: &ServerState) -> Self {
        input.playlist_manager.clone()
    }
}

impl FromRef<ServerState> for OptionalSpotifyOAuth {
    fn from_ref(input: &ServerState) -> Self {
        input.oauth.clone()
    }
}
