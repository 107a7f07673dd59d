//! Spotify account setup: status report and the manual OAuth handshake.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::error::{ApiError, ApiResult};
use super::state::{GuardedPlaylistManager, OptionalSpotifyOAuth, ServerState};
use super::ServerConfig;
use crate::playlist::OAuthError;

const OAUTH_NOT_CONFIGURED: &str = "Spotify OAuth not configured";

#[derive(Serialize)]
struct UserInfo {
    id: String,
    display_name: Option<String>,
}

#[derive(Serialize)]
struct SetupStatus {
    has_credentials: bool,
    is_authenticated: bool,
    user_info: Option<UserInfo>,
    status: &'static str,
    message: &'static str,
    playlist_creation: &'static str,
}

#[derive(Serialize)]
struct AuthUrlResponse {
    auth_url: String,
    redirect_uri: String,
    setup_instructions: Vec<String>,
    example_redirect: String,
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
    state: Option<String>,
}

#[derive(Deserialize)]
struct TokenQuery {
    code: String,
}

#[derive(Serialize)]
struct TokenUser {
    id: String,
    display_name: Option<String>,
    email: Option<String>,
}

#[derive(Serialize)]
struct TokenResponse {
    status: &'static str,
    message: &'static str,
    user: TokenUser,
    expires_in: i64,
}

async fn spotify_setup(
    State(config): State<ServerConfig>,
    State(playlist_manager): State<GuardedPlaylistManager>,
) -> Json<SetupStatus> {
    let has_credentials = config.spotify_credentials;
    let user = playlist_manager.authenticated_user().await;
    let is_authenticated = user.is_some();

    let (status, message) = if is_authenticated {
        ("ready", "Ready to create real playlists!")
    } else if has_credentials {
        (
            "needs_auth",
            "Credentials found but not authenticated - visit /spotify-auth-url to setup",
        )
    } else {
        (
            "needs_credentials",
            "No Spotify credentials - set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET",
        )
    };

    Json(SetupStatus {
        has_credentials,
        is_authenticated,
        user_info: user.map(|u| UserInfo {
            id: u.id,
            display_name: u.display_name,
        }),
        status,
        message,
        playlist_creation: if is_authenticated {
            "enabled"
        } else {
            "disabled"
        },
    })
}

async fn spotify_auth_url(
    State(oauth): State<OptionalSpotifyOAuth>,
) -> ApiResult<Json<AuthUrlResponse>> {
    let oauth = oauth.ok_or_else(|| ApiError::unavailable(OAUTH_NOT_CONFIGURED))?;
    let redirect_uri = oauth.redirect_uri().to_string();

    let setup_instructions = vec![
        "FIRST TIME SETUP:".to_string(),
        "1. Go to https://developer.spotify.com/dashboard".to_string(),
        "2. Select your app (or create one)".to_string(),
        "3. Click 'Edit Settings'".to_string(),
        format!("4. Add '{}' to Redirect URIs", redirect_uri),
        "5. Save the settings".to_string(),
        String::new(),
        "THEN AUTHENTICATE:".to_string(),
        "6. Visit the auth_url below".to_string(),
        "7. Authorize the application".to_string(),
        "8. You'll be redirected back with the authorization code".to_string(),
        "9. Copy the code shown on the callback page".to_string(),
        "10. Use POST /spotify-token with that code".to_string(),
    ];

    Ok(Json(AuthUrlResponse {
        auth_url: oauth.authorize_url().await,
        example_redirect: format!(
            "Example: {}?code=ABC123... (copy the ABC123... part)",
            redirect_uri
        ),
        redirect_uri,
        setup_instructions,
    }))
}

async fn callback(
    State(config): State<ServerConfig>,
    State(oauth): State<OptionalSpotifyOAuth>,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<Json<Value>> {
    let oauth = oauth.ok_or_else(|| ApiError::unavailable(OAUTH_NOT_CONFIGURED))?;

    if let Some(error) = query.error {
        return Ok(Json(json!({
            "error": error,
            "message": "Authorization was denied or failed",
            "instructions": "Please try the authorization process again",
        })));
    }

    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return Ok(Json(json!({
            "error": "no_code",
            "message": "No authorization code received",
            "instructions": "Please try the authorization process again",
        })));
    };

    let state_ok = match query.state.as_deref() {
        Some(state) => oauth.redeem_state(state).await,
        None => false,
    };
    if !state_ok {
        warn!("Rejected Spotify callback with unknown or reused state");
        return Ok(Json(json!({
            "error": "invalid_state",
            "message": "Authorization state is missing, unknown or expired",
            "instructions": "Start again from /spotify-auth-url",
        })));
    }

    let token_url = format!(
        "http://localhost:{}/spotify-token?code={}",
        config.port,
        urlencoding::encode(&code)
    );
    Ok(Json(json!({
        "success": true,
        "authorization_code": code,
        "message": "Authorization successful! Use the code below.",
        "instructions": [
            format!("Your authorization code is: {}", code),
            "",
            "Now send a POST request to /spotify-token with this code:",
            format!("curl -X POST '{}'", token_url),
            "",
            "Or use any HTTP client to POST to /spotify-token with the code parameter",
        ],
        "auto_setup_url": token_url,
    })))
}

async fn spotify_token(
    State(oauth): State<OptionalSpotifyOAuth>,
    State(playlist_manager): State<GuardedPlaylistManager>,
    Query(query): Query<TokenQuery>,
) -> ApiResult<Json<TokenResponse>> {
    let oauth = oauth.ok_or_else(|| ApiError::unavailable(OAUTH_NOT_CONFIGURED))?;

    let token = oauth.exchange_code(&query.code).await.map_err(|e| {
        error!("Spotify token exchange failed: {}", e);
        match e {
            OAuthError::InvalidGrant | OAuthError::Provider(_) => ApiError::bad_request(e.to_string()),
            other => ApiError::internal(other.to_string()),
        }
    })?;

    let user = playlist_manager
        .user_for_token(&token.access_token)
        .await
        .map_err(|e| ApiError::bad_request(format!("Spotify error: {}", e)))?;
    info!(
        "Spotify token successfully set for user: {}",
        user.display_name.as_deref().unwrap_or(&user.id)
    );

    Ok(Json(TokenResponse {
        status: "success",
        message: "Spotify authentication successful - real playlists will now be created",
        expires_in: token.expires_in(),
        user: TokenUser {
            id: user.id,
            display_name: user.display_name,
            email: user.email,
        },
    }))
}

pub fn make_spotify_routes(state: ServerState) -> Router {
    Router::new()
        .route("/spotify-setup", get(spotify_setup))
        .route("/spotify-auth-url", get(spotify_auth_url))
        .route("/callback", get(callback))
        .route("/spotify-token", post(spotify_token))
        .with_state(state)
}
