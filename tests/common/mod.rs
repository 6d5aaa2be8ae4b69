// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{Duration, Utc};
use spotify_unwrapped::config::Config;
use spotify_unwrapped::db::{FirestoreDb, MemoryDb, Store};
use spotify_unwrapped::middleware::auth::create_jwt;
use spotify_unwrapped::models::{Credential, Profile};
use spotify_unwrapped::routes::create_router;
use spotify_unwrapped::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Config whose Spotify endpoints point at `spotify_base`
/// (usually an httpmock server).
#[allow(dead_code)]
pub fn test_config(spotify_base: &str) -> Config {
    Config {
        spotify_accounts_url: spotify_base.to_string(),
        spotify_api_url: spotify_base.to_string(),
        ..Config::test_default()
    }
}

/// Create a test app over an in-memory store.
/// Returns the router, the shared state and the store.
#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>, Arc<MemoryDb>) {
    let store = Arc::new(MemoryDb::new());
    let state = Arc::new(
        AppState::new(config, store.clone()).expect("Failed to build test state"),
    );
    (create_router(state.clone()), state, store)
}

/// Test app with default config (Spotify endpoints unreachable).
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryDb>) {
    create_test_app_with(Config::test_default())
}

/// Session JWT for `user_id`.
#[allow(dead_code)]
pub fn create_test_jwt(state: &AppState, user_id: &str) -> String {
    create_jwt(user_id, &state.config.jwt_signing_key).expect("Failed to sign test JWT")
}

/// Store a profile and a credential valid for an hour.
#[allow(dead_code)]
pub async fn seed_user(state: &AppState, user_id: &str, access_token: &str) {
    seed_profile(state, user_id, &format!("User {}", user_id)).await;
    seed_credential(state, user_id, access_token, Duration::hours(1)).await;
}

#[allow(dead_code)]
pub async fn seed_profile(state: &AppState, user_id: &str, display_name: &str) {
    let mut profile = Profile::new(user_id.to_string(), Utc::now());
    profile.display_name = Some(display_name.to_string());
    state
        .store
        .upsert_profile(&profile)
        .await
        .expect("Failed to seed profile");
}

/// Store a credential expiring `expires_in` from now (negative for expired).
#[allow(dead_code)]
pub async fn seed_credential(
    state: &AppState,
    user_id: &str,
    access_token: &str,
    expires_in: Duration,
) {
    let credential = Credential {
        access_token: access_token.to_string(),
        refresh_token: format!("refresh_{}", user_id),
        expires_at: Some(Utc::now() + expires_in),
        scopes: vec![],
    };
    state
        .tokens
        .store_credential(user_id, &credential)
        .await
        .expect("Failed to seed credential");
}

/// Authenticated request with an optional JSON body.
#[allow(dead_code)]
pub fn authed(
    method: &str,
    uri: &str,
    jwt: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", jwt));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// All `Set-Cookie` header values on a response.
#[allow(dead_code)]
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Whether the store holds any record for `user_id`.
#[allow(dead_code)]
pub async fn user_exists(store: &MemoryDb, user_id: &str) -> bool {
    store.get_profile(user_id).await.unwrap().is_some()
        || store.get_credential(user_id).await.unwrap().is_some()
}
