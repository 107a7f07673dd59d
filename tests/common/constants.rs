//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When fake data changes (tokens, codes, catalog ids), update only this file.

// ============================================================================
// Fake Spotify credentials and tokens
// ============================================================================

pub const CLIENT_ID: &str = "test-client-id";
pub const CLIENT_SECRET: &str = "test-client-secret";

/// Token handed out by the fake accounts service for the client-credentials grant
pub const APP_TOKEN: &str = "app-token";

/// Prefix of every user token the fake accounts service issues
pub const USER_TOKEN_PREFIX: &str = "user-token";
/// Cached user token the fake Spotify rejects; only a refresh gets past it.
pub const STALE_USER_TOKEN: &str = "stale-token";

/// Authorization code the fake accounts service accepts
pub const VALID_AUTH_CODE: &str = "good-code";

/// Authorization code the fake accounts service rejects with `invalid_grant`
pub const INVALID_AUTH_CODE: &str = "expired-code";

/// Id of the user behind every valid user token
pub const SPOTIFY_USER_ID: &str = "kaguya-tester";
pub const SPOTIFY_USER_NAME: &str = "Kaguya Tester";
pub const SPOTIFY_USER_EMAIL: &str = "tester@example.com";

// ============================================================================
// Server settings
// ============================================================================

pub const BRAND: &str = "kaguya";

// ============================================================================
// Fake vision models
// ============================================================================

/// Confidence reported by the fixed mood model
pub const MODEL_CONFIDENCE: f32 = 0.75;

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for a test server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval while waiting for server readiness
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Request timeout for test HTTP client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Time to wait for a WebSocket reply
pub const WS_REPLY_TIMEOUT_MS: u64 = 5000;
