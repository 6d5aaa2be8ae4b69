// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for the authenticated user's profile and account.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{GenreCount, PlayHistoryItem, Profile};
use crate::models::{Artist, Track};
use crate::routes::auth::{logged_in_cookie, session_cookie};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/me/refresh", post(refresh_me))
        .route("/api/account", delete(delete_account))
}

// ─── User Profile ────────────────────────────────────────────

/// Cached profile response.
#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub country: Option<String>,
    pub tier: Option<String>,
    pub top_artists: Vec<Artist>,
    pub top_tracks: Vec<Track>,
    pub top_genres: Vec<GenreCount>,
    pub recently_played: Vec<PlayHistoryItem>,
    pub saved_tracks_count: u32,
    pub saved_albums_count: u32,
    pub playlist_count: u32,
    pub followed_artists_count: u32,
    pub last_synced_at: Option<String>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        let display_name = profile.public_name().to_string();
        let aggregates = profile.aggregates;
        Self {
            id: profile.external_user_id,
            display_name,
            email: profile.email,
            country: profile.country,
            tier: profile.tier,
            top_artists: aggregates.top_artists,
            top_tracks: aggregates.top_tracks,
            top_genres: aggregates.top_genres,
            recently_played: aggregates.recently_played,
            saved_tracks_count: aggregates.saved_tracks_count,
            saved_albums_count: aggregates.saved_albums_count,
            playlist_count: aggregates.playlist_count,
            followed_artists_count: aggregates.followed_artists_count,
            last_synced_at: profile.last_synced_at.map(format_utc_rfc3339),
        }
    }
}

/// Get the cached profile. No Spotify call is made.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>> {
    let profile = state
        .store
        .get_profile(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", user.user_id)))?;

    Ok(Json(profile.into()))
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub profile: ProfileResponse,
    /// False when Spotify listings degraded and cached aggregates were kept.
    pub aggregates_updated: bool,
}

/// Re-sync the cached profile from Spotify.
async fn refresh_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RefreshResponse>> {
    let outcome = state.sync.refresh_profile(&user.user_id).await?;

    Ok(Json(RefreshResponse {
        profile: outcome.profile.into(),
        aggregates_updated: outcome.aggregates_updated,
    }))
}

// ─── Account Deletion ────────────────────────────────────────

/// Response for account deletion.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: String,
    pub deleted_documents: u32,
}

/// Delete the user's account and all associated data.
///
/// Removes the credential, profile, wraps (with their likes), likes given,
/// and follows in both directions, then drops cached tokens and clears the
/// session cookies.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<DeleteAccountResponse>)> {
    tracing::info!(user_id = %user.user_id, "User-initiated account deletion");

    let deleted = state.wraps.delete_account(&user.user_id).await?;

    let secure = state.config.secure_cookies();
    let jar = jar
        .remove(session_cookie(String::new(), secure))
        .remove(logged_in_cookie(secure));

    Ok((
        jar,
        Json(DeleteAccountResponse {
            success: true,
            message: "Account deleted. All data has been removed.".to_string(),
            deleted_documents: deleted as u32,
        }),
    ))
}
