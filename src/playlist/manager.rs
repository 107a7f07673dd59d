use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::cache::{CacheLookup, PlaylistCache};
use super::fallback;
use super::oauth::TokenSource;
use crate::catalog::{CatalogError, PlaylistApi, Track, UserProfile};
use crate::mood::MoodLabel;
use crate::server::metrics;

/// Tracks added to a newly created playlist.
const MAX_PLAYLIST_TRACKS: usize = 50;
const CLEANUP_PAGE_SIZE: u32 = 50;

/// Result of asking for a mood playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistOutcome {
    /// A playlist was created on the user's account by this call.
    Created(String),
    /// A playlist created earlier for this mood.
    Cached(String),
    /// No playlist could be created; a Spotify search link instead.
    Fallback(String),
    /// No playlist and search links are disabled.
    Unavailable,
}

impl PlaylistOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            PlaylistOutcome::Created(url)
            | PlaylistOutcome::Cached(url)
            | PlaylistOutcome::Fallback(url) => Some(url),
            PlaylistOutcome::Unavailable => None,
        }
    }

    pub fn into_url(self) -> Option<String> {
        match self {
            PlaylistOutcome::Created(url)
            | PlaylistOutcome::Cached(url)
            | PlaylistOutcome::Fallback(url) => Some(url),
            PlaylistOutcome::Unavailable => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("No authenticated Spotify client available")]
    NotAuthenticated,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedPlaylist {
    pub name: String,
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: Vec<DeletedPlaylist>,
}

pub struct PlaylistManager {
    brand: String,
    cache: PlaylistCache,
    tokens: Option<Arc<dyn TokenSource>>,
    api: Arc<dyn PlaylistApi>,
    fallback_search_url: bool,
}

impl PlaylistManager {
    pub fn new(
        brand: impl Into<String>,
        tokens: Option<Arc<dyn TokenSource>>,
        api: Arc<dyn PlaylistApi>,
        fallback_search_url: bool,
    ) -> Self {
        Self {
            brand: brand.into(),
            cache: PlaylistCache::new(),
            tokens,
            api,
            fallback_search_url,
        }
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn cache(&self) -> &PlaylistCache {
        &self.cache
    }

    pub fn playlist_name(&self, mood: MoodLabel) -> String {
        format!("{} {} mood", self.brand, mood.token())
    }

    pub fn playlist_description(&self, mood: MoodLabel) -> String {
        format!(
            "curated {} playlist generated by {} ai mood detection",
            mood.token(),
            self.brand
        )
    }

    async fn user_token(&self) -> Option<String> {
        match &self.tokens {
            Some(tokens) => tokens.access_token().await,
            None => None,
        }
    }

    /// The user behind the OAuth session, if the session is usable.
    pub async fn authenticated_user(&self) -> Option<UserProfile> {
        let token = self.user_token().await?;
        match self.api.current_user(&token).await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Spotify user token rejected: {}", e);
                None
            }
        }
    }

    /// Looks up the profile owning a freshly issued token.
    pub async fn user_for_token(&self, token: &str) -> Result<UserProfile, CatalogError> {
        self.api.current_user(token).await
    }

    /// Returns the playlist for a mood, creating it on first use.
    ///
    /// At most one playlist is created per mood. Anything that prevents
    /// creation degrades to [`PlaylistOutcome::Fallback`] or
    /// [`PlaylistOutcome::Unavailable`].
    pub async fn playlist_for_mood(&self, mood: MoodLabel, tracks: &[Track]) -> PlaylistOutcome {
        if let Some(url) = self.cache.peek(mood) {
            info!("Reusing existing playlist for mood '{}': {}", mood, url);
            return PlaylistOutcome::Cached(url);
        }

        if tracks.is_empty() {
            return self.fallback(mood, tracks);
        }

        let Some(token) = self.user_token().await else {
            info!("No authenticated Spotify session, not creating a playlist");
            return self.fallback(mood, tracks);
        };

        let lookup = self
            .cache
            .get_or_create(mood, || self.create_playlist(&token, mood, tracks))
            .await;

        match lookup {
            Ok(Some(CacheLookup::Hit(url))) => PlaylistOutcome::Cached(url),
            Ok(Some(CacheLookup::Created(url))) => PlaylistOutcome::Created(url),
            Ok(None) => self.fallback(mood, tracks),
            Err(e) => {
                error!("Error creating Spotify playlist for mood '{}': {}", mood, e);
                self.fallback(mood, tracks)
            }
        }
    }

    fn fallback(&self, mood: MoodLabel, tracks: &[Track]) -> PlaylistOutcome {
        if self.fallback_search_url {
            PlaylistOutcome::Fallback(fallback::search_url(tracks, Some(mood)))
        } else {
            PlaylistOutcome::Unavailable
        }
    }

    async fn create_playlist(
        &self,
        token: &str,
        mood: MoodLabel,
        tracks: &[Track],
    ) -> Result<Option<String>, CatalogError> {
        let user = self.api.current_user(token).await?;
        let name = self.playlist_name(mood);
        let playlist = self
            .api
            .create_playlist(
                token,
                &user.id,
                &name,
                &self.playlist_description(mood),
                true,
            )
            .await?;

        let mut seen = HashSet::new();
        let uris: Vec<String> = tracks
            .iter()
            .take(MAX_PLAYLIST_TRACKS)
            .map(|t| format!("spotify:track:{}", t.id))
            .filter(|uri| seen.insert(uri.clone()))
            .collect();

        if !uris.is_empty() {
            self.api.add_tracks(token, &playlist.id, &uris).await?;
        }

        metrics::record_playlist_created();
        info!(
            "Created public Spotify playlist '{}' with {} tracks",
            name,
            uris.len()
        );
        Ok(Some(playlist.url))
    }

    /// Unfollows every playlist on the account whose name starts with the
    /// brand (ignoring case) and forgets all cached playlists.
    pub async fn cleanup(&self) -> Result<CleanupReport, CleanupError> {
        let token = self
            .user_token()
            .await
            .ok_or(CleanupError::NotAuthenticated)?;
        if let Err(e) = self.api.current_user(&token).await {
            warn!("Spotify user token rejected during cleanup: {}", e);
            return Err(CleanupError::NotAuthenticated);
        }

        let mut playlists = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .api
                .list_playlists(&token, CLEANUP_PAGE_SIZE, offset)
                .await?;
            playlists.extend(page.playlists);
            // A short page ends the listing; null entries still count.
            if page.page_len < CLEANUP_PAGE_SIZE as usize {
                break;
            }
            offset += CLEANUP_PAGE_SIZE;
        }

        let prefix = self.brand.to_lowercase();
        let mut report = CleanupReport::default();
        for playlist in playlists
            .into_iter()
            .filter(|p| p.name.to_lowercase().starts_with(&prefix))
        {
            match self.api.unfollow_playlist(&token, &playlist.id).await {
                Ok(()) => {
                    info!("Deleted playlist: {}", playlist.name);
                    report.deleted.push(DeletedPlaylist {
                        url: playlist.url(),
                        name: playlist.name,
                        id: playlist.id,
                    });
                }
                Err(e) => error!("Failed to delete playlist {}: {}", playlist.name, e),
            }
        }

        self.cache.clear();
        info!(
            "Cleanup complete: deleted {} {} playlists",
            report.deleted.len(),
            self.brand
        );
        Ok(report)
    }
}
