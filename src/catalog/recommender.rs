use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

use super::{CatalogTrack, MusicCatalog};
use crate::mood::DetectedMood;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 50;

const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// A recommended track as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub image_url: Option<String>,
    pub preview_url: Option<String>,
    pub spotify_url: String,
    pub duration_ms: u64,
    pub popularity: u32,
}

impl From<CatalogTrack> for Track {
    fn from(track: CatalogTrack) -> Self {
        let artist = track
            .artists
            .into_iter()
            .next()
            .map(|a| a.name)
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        let album = track.album.unwrap_or_default();
        // Prefer the medium sized cover, which Spotify lists second.
        let image_url = album
            .images
            .get(1)
            .or_else(|| album.images.first())
            .map(|image| image.url.clone());

        let spotify_url = track
            .external_urls
            .spotify
            .unwrap_or_else(|| format!("https://open.spotify.com/track/{}", track.id));

        Track {
            id: track.id,
            name: track.name,
            artist,
            album: album.name.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            image_url,
            preview_url: track.preview_url,
            spotify_url,
            duration_ms: track.duration_ms,
            popularity: track.popularity,
        }
    }
}

/// Clamps a client supplied `limit` into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> u32 {
    limit
        .unwrap_or(DEFAULT_LIMIT as i64)
        .clamp(1, MAX_LIMIT as i64) as u32
}

pub struct MusicRecommender {
    catalog: Arc<dyn MusicCatalog>,
}

impl MusicRecommender {
    pub fn new(catalog: Arc<dyn MusicCatalog>) -> Self {
        Self { catalog }
    }

    /// Searches the catalog for tracks matching the mood.
    ///
    /// Over-fetches so that duplicates can be dropped and still fill `limit`.
    /// Catalog failures are logged and produce an empty list.
    pub async fn recommend(&self, mood: DetectedMood, limit: u32) -> Vec<Track> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let query = mood.search_query();
        let search_limit = (limit * 2).min(MAX_LIMIT);

        let results = match self.catalog.search_tracks(query, search_limit).await {
            Ok(results) => results,
            Err(e) => {
                error!("Error searching catalog for mood '{}': {}", mood, e);
                return vec![];
            }
        };

        let total = results.len();
        let mut seen = HashSet::new();
        let tracks: Vec<Track> = results
            .into_iter()
            .filter(|track| seen.insert(track.id.clone()))
            .take(limit as usize)
            .map(Track::from)
            .collect();

        info!(
            "Found {} unique tracks for mood '{}' (filtered from {} total)",
            tracks.len(),
            mood,
            total
        );
        tracks
    }
}
