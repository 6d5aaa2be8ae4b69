// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth cookie attribute tests.
//!
//! These tests verify cookie removal attributes on logout match the creation
//! attributes, so browsers actually drop the cookies.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use spotify_unwrapped::config::Config;
use tower::ServiceExt;

mod common;

fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

async fn logout_cookies(frontend_url: &str) -> Vec<String> {
    let config = Config {
        frontend_url: frontend_url.to_string(),
        ..Config::test_default()
    };
    let (app, _, _) = common::create_test_app_with(config);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/logout")
                .header(
                    header::COOKIE,
                    "unwrapped_session=test; unwrapped_logged_in=1; unwrapped_oauth_nonce=nonce",
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    common::set_cookies(&response)
}

#[tokio::test]
async fn test_logout_cookie_removal_localhost_attributes() {
    let set_cookies = logout_cookies("http://localhost:5173").await;

    let session = find_cookie(&set_cookies, "unwrapped_session");
    let hint = find_cookie(&set_cookies, "unwrapped_logged_in");
    let nonce = find_cookie(&set_cookies, "unwrapped_oauth_nonce");

    for cookie in [&session, &hint, &nonce] {
        assert!(cookie.contains("Max-Age=0"), "{cookie}");
        assert!(!cookie.contains("Secure"), "{cookie}");
    }
    assert!(session.contains("Path=/"));
    assert!(session.contains("HttpOnly"));
    assert!(!hint.contains("HttpOnly"));
    assert!(nonce.contains("Path=/auth/spotify/callback"));
}

#[tokio::test]
async fn test_logout_cookie_removal_production_is_secure() {
    let set_cookies = logout_cookies("https://unwrapped.example").await;

    for name in [
        "unwrapped_session",
        "unwrapped_logged_in",
        "unwrapped_oauth_nonce",
    ] {
        let cookie = find_cookie(&set_cookies, name);
        assert!(cookie.contains("Secure"), "{cookie}");
        assert!(cookie.contains("SameSite=Lax"), "{cookie}");
    }
}
