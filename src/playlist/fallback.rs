//! Spotify search links used when no playlist can be created.

use crate::catalog::Track;
use crate::mood::MoodLabel;

const SEARCH_BASE: &str = "https://open.spotify.com/search/";

/// Number of tracks whose "name artist" pairs go into the search query.
const QUERY_TRACKS: usize = 5;

/// Builds an `open.spotify.com` search URL approximating the mood playlist.
pub fn search_url(tracks: &[Track], mood: Option<MoodLabel>) -> String {
    let names: Vec<String> = tracks
        .iter()
        .take(QUERY_TRACKS)
        .filter(|t| !t.name.is_empty() && !t.artist.is_empty())
        .map(|t| format!("{} {}", t.name, t.artist))
        .collect();

    if names.is_empty() {
        let token = mood.map(|m| m.token()).unwrap_or_else(|| "mood".to_string());
        return format!("{SEARCH_BASE}{token}%20music");
    }

    let mut query = names.join(" ");
    if let Some(mood) = mood {
        query = format!("{} {}", mood, query);
    }
    format!("{SEARCH_BASE}{}", urlencoding::encode(&query))
}
