//! Music catalog access: the Spotify Web API client and mood based
//! track recommendations built on top of it.

pub mod models;
pub mod recommender;
pub mod spotify;

pub use models::{CatalogTrack, PlaylistSummary, UserProfile};
pub use recommender::{clamp_limit, MusicRecommender, Track, DEFAULT_LIMIT, MAX_LIMIT};
pub use spotify::{SpotifyClient, SpotifyClientConfig};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Request to Spotify failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Spotify returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Spotify client credentials are not configured")]
    MissingCredentials,

    #[error("Spotify response had no {0}")]
    MissingField(&'static str),
}

/// Track search. Implemented by [`SpotifyClient`] and by test fakes.
#[async_trait]
pub trait MusicCatalog: Send + Sync {
    /// Returns up to `limit` tracks in catalog relevance order. Null entries
    /// of the underlying page are already dropped.
    async fn search_tracks(&self, query: &str, limit: u32)
        -> Result<Vec<CatalogTrack>, CatalogError>;
}

/// A playlist that was just created on the user's account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPlaylist {
    pub id: String,
    pub url: String,
}

/// One page of the user's playlists.
#[derive(Debug, Clone, Default)]
pub struct PlaylistListing {
    pub playlists: Vec<PlaylistSummary>,
    /// Entries on the page, including the null ones that were dropped.
    pub page_len: usize,
}

/// User scoped endpoints, called with an OAuth user access token.
#[async_trait]
pub trait PlaylistApi: Send + Sync {
    async fn current_user(&self, token: &str) -> Result<UserProfile, CatalogError>;

    async fn create_playlist(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<CreatedPlaylist, CatalogError>;

    async fn add_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), CatalogError>;

    async fn list_playlists(
        &self,
        token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<PlaylistListing, CatalogError>;

    async fn unfollow_playlist(&self, token: &str, playlist_id: &str) -> Result<(), CatalogError>;
}
