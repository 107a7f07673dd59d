//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_health() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.health().await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

#![allow(dead_code)]

mod client;
mod constants;
mod fake_spotify;
mod fakes;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use fake_spotify::{catalog_track, FakeSpotify};
pub use fakes::{blank_image_base64, face_image_base64, face_image_data_url, png_bytes};
pub use server::TestServer;
