// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify OAuth authentication routes.
//!
//! The `state` parameter is `base64url(frontend_url|nonce_hex|timestamp_hex|hmac_hex)`.
//! The nonce is also set in an HttpOnly cookie scoped to the callback path,
//! which binds the flow to the browser that started it.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Nonce cookie binding the OAuth flow to this browser.
pub const NONCE_COOKIE: &str = "unwrapped_oauth_nonce";
/// Non-HttpOnly hint so the frontend knows a session exists.
pub const LOGGED_IN_COOKIE: &str = "unwrapped_logged_in";
/// Path the nonce cookie is scoped to.
pub const CALLBACK_PATH: &str = "/auth/spotify/callback";
/// Maximum age of an OAuth `state` (10 minutes).
pub const STATE_MAX_AGE_SECS: i64 = 10 * 60;
/// Tolerated clock skew for `state` timestamps from the future.
const STATE_CLOCK_SKEW_SECS: i64 = 60;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/spotify", get(auth_start))
        .route(CALLBACK_PATH, get(auth_callback))
        .route("/auth/logout", post(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses FRONTEND_URL env var.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Spotify authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let frontend_url = match params.redirect_uri {
        Some(uri) if is_allowed_frontend(&uri, &state.config.frontend_url) => uri,
        Some(uri) => {
            tracing::warn!(redirect_uri = %uri, "Rejected redirect_uri, using default frontend");
            state.config.frontend_url.clone()
        }
        None => state.config.frontend_url.clone(),
    };

    let nonce = hex::encode(rand::random::<[u8; 16]>());
    let oauth_state = sign_state(
        &frontend_url,
        &nonce,
        chrono::Utc::now().timestamp(),
        &state.config.oauth_state_key,
    )?;

    let auth_url = state.spotify.authorize_url(&oauth_state);

    tracing::info!(
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Spotify"
    );

    let secure = state.config.secure_cookies();
    Ok((
        jar.add(nonce_cookie(nonce, secure)),
        Redirect::temporary(&auth_url),
    ))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - verify state, link account, create session.
///
/// Every failure redirects to the frontend with an `error` parameter.
/// Nothing is written to the store unless the state checks pass.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let config = &state.config;
    let secure = config.secure_cookies();
    let cookie_nonce = jar.get(NONCE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(nonce_cookie(String::new(), secure));

    let verified = params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &config.oauth_state_key, chrono::Utc::now().timestamp()))
        .filter(|v| nonce_matches(&v.nonce, cookie_nonce.as_deref()));

    let Some(verified) = verified else {
        tracing::warn!("OAuth state rejected (signature, age or nonce mismatch)");
        return (jar, error_redirect(&config.frontend_url, "invalid_state"));
    };
    let frontend_url = verified.frontend_url;

    // Check for OAuth errors
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Spotify");
        return (jar, error_redirect(&frontend_url, &error));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (jar, error_redirect(&frontend_url, "missing_code"));
    };

    tracing::info!("Exchanging authorization code for tokens");

    let profile = match state.sync.link_account(&code).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(error = %e, kind = e.kind(), "Account linking failed");
            return (jar, error_redirect(&frontend_url, "auth_failed"));
        }
    };

    let jwt = match create_jwt(&profile.external_user_id, &config.jwt_signing_key) {
        Ok(jwt) => jwt,
        Err(e) => {
            tracing::error!(error = %e, "JWT creation failed");
            return (jar, error_redirect(&frontend_url, "auth_failed"));
        }
    };

    tracing::info!(user_id = %profile.external_user_id, "OAuth successful, session created");

    let jar = jar
        .add(session_cookie(jwt, secure))
        .add(logged_in_cookie(secure));
    (
        jar,
        Redirect::temporary(&format!("{}/dashboard", frontend_url)),
    )
}

/// Logout - clear session cookies.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let secure = state.config.secure_cookies();
    let jar = jar
        .remove(session_cookie(String::new(), secure))
        .remove(logged_in_cookie(secure))
        .remove(nonce_cookie(String::new(), secure));
    (jar, StatusCode::NO_CONTENT)
}

// ─── State Signing ───────────────────────────────────────────────────────

/// Decoded and verified OAuth state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedState {
    pub frontend_url: String,
    pub nonce: String,
}

/// Build a signed `state` value.
pub fn sign_state(
    frontend_url: &str,
    nonce: &str,
    timestamp_secs: i64,
    secret: &[u8],
) -> Result<String> {
    let payload = format!("{}|{}|{:x}", frontend_url, nonce, timestamp_secs);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify signature and age of a `state` value.
pub fn verify_state(state: &str, secret: &[u8], now_secs: i64) -> Option<VerifiedState> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Split from the right so a `|` in the URL cannot shift fields.
    let mut parts = state_str.rsplitn(4, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let nonce = parts.next()?;
    let frontend_url = parts.next()?;

    let payload = format!("{}|{}|{}", frontend_url, nonce, timestamp_hex);
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let timestamp = i64::from_str_radix(timestamp_hex, 16).ok()?;
    let age = now_secs - timestamp;
    if !(-STATE_CLOCK_SKEW_SECS..=STATE_MAX_AGE_SECS).contains(&age) {
        tracing::warn!(age, "OAuth state expired");
        return None;
    }

    Some(VerifiedState {
        frontend_url: frontend_url.to_string(),
        nonce: nonce.to_string(),
    })
}

fn nonce_matches(expected: &str, cookie: Option<&str>) -> bool {
    match cookie {
        Some(cookie) if !expected.is_empty() => {
            bool::from(expected.as_bytes().ct_eq(cookie.as_bytes()))
        }
        _ => false,
    }
}

/// Frontend redirect targets: the configured URL, or localhost for dev.
pub(crate) fn is_allowed_frontend(uri: &str, configured: &str) -> bool {
    if uri == configured {
        return true;
    }
    match uri.strip_prefix("http://localhost") {
        Some(rest) => rest.is_empty() || rest.starts_with(':') || rest.starts_with('/'),
        None => false,
    }
}

fn error_redirect(frontend_url: &str, error: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}?error={}",
        frontend_url,
        urlencoding::encode(error)
    ))
}

// ─── Cookies ─────────────────────────────────────────────────────────────

pub(crate) fn session_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS))
        .build()
}

pub(crate) fn logged_in_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((LOGGED_IN_COOKIE, "1"))
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS))
        .build()
}

fn nonce_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((NONCE_COOKIE, value))
        .path(CALLBACK_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(STATE_MAX_AGE_SECS))
        .build()
}
