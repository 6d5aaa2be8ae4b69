// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth flow tests.
//!
//! These tests verify that:
//! 1. The authorize redirect carries a signed state and sets the nonce cookie
//! 2. A callback whose state or nonce does not check out creates nothing
//! 3. A good callback links the account and sets the session cookies

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use httpmock::prelude::*;
use serde_json::json;
use spotify_unwrapped::routes::auth::{sign_state, verify_state, NONCE_COOKIE};
use tower::ServiceExt;

mod common;

const NONCE: &str = "00112233445566778899aabbccddeeff";

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

fn callback_request(query: &str, nonce_cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(format!("/auth/spotify/callback?{}", query));
    if let Some(nonce) = nonce_cookie {
        builder = builder.header(header::COOKIE, format!("{}={}", NONCE_COOKIE, nonce));
    }
    builder.body(Body::empty()).unwrap()
}

fn signed_state(frontend_url: &str, nonce: &str, key: &[u8]) -> String {
    sign_state(frontend_url, nonce, chrono::Utc::now().timestamp(), key).unwrap()
}

#[tokio::test]
async fn test_auth_start_redirects_with_signed_state() {
    let (app, state, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/spotify")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let url = location(&response);
    assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
    assert!(url.contains("client_id=test_client_id"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("user-top-read"));

    let raw_state = url
        .split('&')
        .find_map(|p| p.strip_prefix("state="))
        .expect("state parameter");
    let oauth_state = urlencoding::decode(raw_state).unwrap();
    let verified = verify_state(
        &oauth_state,
        &state.config.oauth_state_key,
        chrono::Utc::now().timestamp(),
    )
    .expect("state should verify");
    assert_eq!(verified.frontend_url, state.config.frontend_url);

    let cookies = common::set_cookies(&response);
    let nonce_cookie = cookies
        .iter()
        .find(|c| c.starts_with(&format!("{}=", NONCE_COOKIE)))
        .expect("nonce cookie");
    assert!(nonce_cookie.contains(&verified.nonce));
    assert!(nonce_cookie.contains("HttpOnly"));
    assert!(nonce_cookie.contains("Path=/auth/spotify/callback"));
}

#[tokio::test]
async fn test_auth_start_ignores_foreign_redirect_uri() {
    let (app, state, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/spotify?redirect_uri=https%3A%2F%2Fevil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let url = location(&response);
    let raw_state = url
        .split('&')
        .find_map(|p| p.strip_prefix("state="))
        .unwrap();
    let verified = verify_state(
        &urlencoding::decode(raw_state).unwrap(),
        &state.config.oauth_state_key,
        chrono::Utc::now().timestamp(),
    )
    .unwrap();
    assert_eq!(verified.frontend_url, "http://localhost:5173");
}

#[tokio::test]
async fn test_callback_with_forged_state_creates_nothing() {
    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/token");
            then.status(200).json_body(json!({}));
        })
        .await;
    let (app, _, store) = common::create_test_app_with(common::test_config(&server.base_url()));

    let forged = signed_state("http://localhost:5173", NONCE, b"wrong_key");
    let response = app
        .oneshot(callback_request(
            &format!("code=abc&state={}", urlencoding::encode(&forged)),
            Some(NONCE),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "http://localhost:5173?error=invalid_state"
    );
    assert_eq!(token_mock.calls(), 0);
    assert!(!common::user_exists(&store, "user1").await);
}

#[tokio::test]
async fn test_callback_with_mismatched_nonce_rejected() {
    let (app, state, store) = common::create_test_app();

    let good = signed_state("http://localhost:5173", NONCE, &state.config.oauth_state_key);
    let query = format!("code=abc&state={}", urlencoding::encode(&good));

    for cookie in [None, Some("ffeeddccbbaa99887766554433221100")] {
        let response = app
            .clone()
            .oneshot(callback_request(&query, cookie))
            .await
            .unwrap();
        assert_eq!(
            location(&response),
            "http://localhost:5173?error=invalid_state"
        );
    }
    assert!(!common::user_exists(&store, "user1").await);
}

#[tokio::test]
async fn test_callback_with_missing_state_rejected() {
    let (app, _, _) = common::create_test_app();

    let response = app
        .oneshot(callback_request("code=abc", Some(NONCE)))
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        "http://localhost:5173?error=invalid_state"
    );
}

#[tokio::test]
async fn test_callback_passes_through_spotify_error() {
    let (app, state, _) = common::create_test_app();

    let good = signed_state("http://localhost:5173", NONCE, &state.config.oauth_state_key);
    let response = app
        .oneshot(callback_request(
            &format!("error=access_denied&state={}", urlencoding::encode(&good)),
            Some(NONCE),
        ))
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        "http://localhost:5173?error=access_denied"
    );
}

#[tokio::test]
async fn test_callback_success_links_account() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/token")
                .body_includes("grant_type=authorization_code")
                .body_includes("code=good_code");
            then.status(200).json_body(json!({
                "access_token": "access_1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "refresh_1",
                "scope": "user-read-private user-top-read"
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/me")
                .header("authorization", "Bearer access_1");
            then.status(200).json_body(json!({
                "id": "user1",
                "display_name": "Listener",
                "country": "US",
                "product": "premium"
            }));
        })
        .await;

    let (app, state, store) = common::create_test_app_with(common::test_config(&server.base_url()));

    let good = signed_state("http://localhost:5173", NONCE, &state.config.oauth_state_key);
    let response = app
        .oneshot(callback_request(
            &format!("code=good_code&state={}", urlencoding::encode(&good)),
            Some(NONCE),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "http://localhost:5173/dashboard");

    let cookies = common::set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("unwrapped_session=")));
    assert!(cookies.iter().any(|c| c.starts_with("unwrapped_logged_in=1")));
    // Nonce is single use.
    assert!(cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=;", NONCE_COOKIE)) && c.contains("Max-Age=0")));

    use spotify_unwrapped::db::Store;
    let profile = store.get_profile("user1").await.unwrap().unwrap();
    assert_eq!(profile.display_name.as_deref(), Some("Listener"));
    assert_eq!(profile.tier.as_deref(), Some("premium"));

    let stored = store.get_credential("user1").await.unwrap().unwrap();
    assert_ne!(stored.access_token_encrypted, "access_1");
    assert_eq!(state.tokens.access_token("user1").await.unwrap(), "access_1");
}

#[tokio::test]
async fn test_callback_token_exchange_failure_redirects() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/token");
            then.status(400)
                .json_body(json!({"error": "invalid_grant"}));
        })
        .await;
    let (app, state, store) = common::create_test_app_with(common::test_config(&server.base_url()));

    let good = signed_state("http://localhost:5173", NONCE, &state.config.oauth_state_key);
    let response = app
        .oneshot(callback_request(
            &format!("code=bad_code&state={}", urlencoding::encode(&good)),
            Some(NONCE),
        ))
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        "http://localhost:5173?error=auth_failed"
    );
    assert!(common::set_cookies(&response)
        .iter()
        .all(|c| !c.starts_with("unwrapped_session=ey")));
    assert!(!common::user_exists(&store, "user1").await);
}
