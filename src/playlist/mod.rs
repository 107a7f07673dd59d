//! Per-mood Spotify playlists and the OAuth session that creates them.

mod cache;
pub mod fallback;
mod manager;
pub mod oauth;

pub use cache::{CacheLookup, PlaylistCache};
pub use manager::{CleanupError, CleanupReport, DeletedPlaylist, PlaylistManager, PlaylistOutcome};
pub use oauth::{OAuthError, OAuthSettings, SpotifyOAuth, StoredToken, TokenSource};
