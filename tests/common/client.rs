//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all kaguya-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {} failed: {}", path, e))
    }

    async fn post(&self, path: &str) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap_or_else(|e| panic!("POST {} failed: {}", path, e))
    }

    // ========================================================================
    // Info Endpoints
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.get("/").await
    }

    /// GET /health
    pub async fn health(&self) -> Response {
        self.get("/health").await
    }

    /// GET /moods
    pub async fn moods(&self) -> Response {
        self.get("/moods").await
    }

    // ========================================================================
    // Mood Detection Endpoints
    // ========================================================================

    /// POST /detect-mood
    pub async fn detect_mood(&self, image_base64: &str) -> Response {
        self.client
            .post(format!("{}/detect-mood", self.base_url))
            .json(&json!({ "image_base64": image_base64 }))
            .send()
            .await
            .expect("Detect mood request failed")
    }

    /// POST /mood-and-playlist
    pub async fn mood_and_playlist(&self, image_base64: &str, limit: Option<i64>) -> Response {
        let mut request = self
            .client
            .post(format!("{}/mood-and-playlist", self.base_url))
            .json(&json!({ "image_base64": image_base64 }));
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        request.send().await.expect("Mood and playlist request failed")
    }

    /// POST /upload-image with the bytes in the `file` field
    pub async fn upload_image(&self, filename: &str, bytes: Vec<u8>) -> Response {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("image/png")
            .expect("Invalid mime type");
        self.upload_form(Form::new().part("file", part)).await
    }

    /// POST /upload-image with an arbitrary multipart form
    pub async fn upload_form(&self, form: Form) -> Response {
        self.client
            .post(format!("{}/upload-image", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    // ========================================================================
    // Playlist Endpoints
    // ========================================================================

    /// GET /playlist/{mood}
    pub async fn playlist(&self, mood: &str, limit: Option<i64>) -> Response {
        let mut request = self
            .client
            .get(format!("{}/playlist/{}", self.base_url, mood));
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        request.send().await.expect("Playlist request failed")
    }

    /// POST /cleanup
    pub async fn cleanup(&self) -> Response {
        self.post("/cleanup").await
    }

    // ========================================================================
    // Spotify Setup Endpoints
    // ========================================================================

    /// GET /spotify-setup
    pub async fn spotify_setup(&self) -> Response {
        self.get("/spotify-setup").await
    }

    /// GET /spotify-auth-url
    pub async fn spotify_auth_url(&self) -> Response {
        self.get("/spotify-auth-url").await
    }

    /// GET /callback with the given query string
    pub async fn callback(&self, query: &[(&str, &str)]) -> Response {
        self.client
            .get(format!("{}/callback", self.base_url))
            .query(query)
            .send()
            .await
            .expect("Callback request failed")
    }

    /// POST /spotify-token?code=
    pub async fn spotify_token(&self, code: &str) -> Response {
        self.client
            .post(format!("{}/spotify-token", self.base_url))
            .query(&[("code", code)])
            .send()
            .await
            .expect("Spotify token request failed")
    }
}
