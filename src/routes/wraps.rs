// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wrap, feed, like and follow routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    serialize_or_empty, Album, Artist, Follow, GenreCount, TimeRange, Track, Visibility, WrapLike,
    WrapSnapshot,
};
use crate::services::{WrapOptions, WrapPreview};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use validator::Validate;

/// Maximum items in one feed response.
const FEED_LIMIT: u32 = 50;

/// Wrap and social routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/wraps", get(list_wraps).post(create_wrap))
        .route("/api/wraps/{id}", get(get_wrap).delete(delete_wrap))
        .route("/api/wraps/{id}/visibility", post(toggle_visibility))
        .route("/api/wraps/{id}/like", post(like_wrap).delete(unlike_wrap))
        .route("/api/feed", get(get_feed))
        .route("/api/feed/{id}", get(get_feed_wrap))
        .route(
            "/api/profiles/{id}/follow",
            post(follow_profile).delete(unfollow_profile),
        )
}

// ─── Building ────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, Validate)]
pub struct BuildWrapRequest {
    pub time_range: Option<TimeRange>,
    /// Spotify accepts at most 50 items per page.
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u32>,
}

impl BuildWrapRequest {
    /// Parse an optional JSON body. An empty body selects the defaults.
    fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let request: Self = serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))?;
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        Ok(request)
    }

    fn options(&self) -> WrapOptions {
        let defaults = WrapOptions::default();
        WrapOptions {
            time_range: self.time_range.unwrap_or(defaults.time_range),
            limit: self.limit.unwrap_or(defaults.limit),
        }
    }
}

#[derive(Serialize)]
pub struct BuildWrapResponse {
    pub wrap_id: String,
    pub preview: WrapPreview,
}

/// Build a new wrap from current Spotify data.
async fn create_wrap(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<(StatusCode, Json<BuildWrapResponse>)> {
    let request = BuildWrapRequest::from_body(&body)?;
    let wrap = state.wraps.build_wrap(&user.user_id, request.options()).await?;

    Ok((
        StatusCode::CREATED,
        Json(BuildWrapResponse {
            preview: WrapPreview::from_payload(&wrap.payload),
            wrap_id: wrap.id,
        }),
    ))
}

// ─── Owner Views ─────────────────────────────────────────────

/// One row of the owner's wrap list.
#[derive(Serialize)]
pub struct WrapSummary {
    pub id: String,
    pub year: i32,
    pub created_at: String,
    pub visibility: Visibility,
    pub time_range: TimeRange,
    #[serde(serialize_with = "serialize_or_empty")]
    pub top_artist: Option<String>,
    #[serde(serialize_with = "serialize_or_empty")]
    pub top_track: Option<String>,
    pub genre_count: u32,
}

impl From<&WrapSnapshot> for WrapSummary {
    fn from(wrap: &WrapSnapshot) -> Self {
        Self {
            id: wrap.id.clone(),
            year: wrap.year,
            created_at: format_utc_rfc3339(wrap.created_at),
            visibility: wrap.visibility,
            time_range: wrap.time_range,
            top_artist: wrap.payload.top_artist.as_ref().map(|a| a.name.clone()),
            top_track: wrap.payload.top_track.as_ref().map(|t| t.name.clone()),
            genre_count: wrap.payload.unique_genres_count,
        }
    }
}

/// Full wrap with every ranked list.
#[derive(Serialize)]
pub struct WrapDetail {
    pub id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub year: i32,
    pub created_at: String,
    pub visibility: Visibility,
    pub time_range: TimeRange,
    #[serde(serialize_with = "serialize_or_empty")]
    pub top_artist: Option<Artist>,
    pub top_artists: Vec<Artist>,
    #[serde(serialize_with = "serialize_or_empty")]
    pub approximated_top_album: Option<Album>,
    pub top_albums: Vec<Album>,
    #[serde(serialize_with = "serialize_or_empty")]
    pub top_track: Option<Track>,
    pub top_tracks: Vec<Track>,
    pub top_followed_artists: Vec<Artist>,
    pub top_genres: Vec<GenreCount>,
    pub unique_genres_count: u32,
    pub unique_artists_count: u32,
    pub unique_tracks_count: u32,
    pub likes_count: u32,
    pub is_liked: bool,
}

impl WrapDetail {
    fn new(wrap: WrapSnapshot, owner_name: String, likes_count: u32, is_liked: bool) -> Self {
        let payload = wrap.payload;
        Self {
            id: wrap.id,
            owner_id: wrap.owner_id,
            owner_name,
            year: wrap.year,
            created_at: format_utc_rfc3339(wrap.created_at),
            visibility: wrap.visibility,
            time_range: wrap.time_range,
            top_artist: payload.top_artist,
            top_artists: payload.top_artists,
            approximated_top_album: payload.approximated_top_album,
            top_albums: payload.top_albums,
            top_track: payload.top_track,
            top_tracks: payload.top_tracks,
            top_followed_artists: payload.top_followed_artists,
            top_genres: payload.top_genres,
            unique_genres_count: payload.unique_genres_count,
            unique_artists_count: payload.unique_artists_count,
            unique_tracks_count: payload.unique_tracks_count,
            likes_count,
            is_liked,
        }
    }
}

/// List the caller's wraps, newest first.
async fn list_wraps(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<WrapSummary>>> {
    let wraps = state.store.list_wraps_for_owner(&user.user_id).await?;
    Ok(Json(wraps.iter().map(WrapSummary::from).collect()))
}

/// Fetch a wrap the caller owns. Wraps owned by someone else look absent.
async fn owned_wrap(state: &AppState, wrap_id: &str, user_id: &str) -> Result<WrapSnapshot> {
    state
        .store
        .get_wrap(wrap_id)
        .await?
        .filter(|wrap| wrap.owner_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Wrap {} not found", wrap_id)))
}

async fn detail_for(state: &AppState, wrap: WrapSnapshot, user_id: &str) -> Result<WrapDetail> {
    let owner_name = owner_name(state, &wrap.owner_id).await?;
    let likes_count = state.store.count_likes(&wrap.id).await?;
    let is_liked = state
        .store
        .liked_wrap_ids(user_id)
        .await?
        .iter()
        .any(|id| *id == wrap.id);
    Ok(WrapDetail::new(wrap, owner_name, likes_count, is_liked))
}

async fn owner_name(state: &AppState, owner_id: &str) -> Result<String> {
    Ok(state
        .store
        .get_profile(owner_id)
        .await?
        .map(|p| p.public_name().to_string())
        .unwrap_or_else(|| owner_id.to_string()))
}

async fn get_wrap(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(wrap_id): Path<String>,
) -> Result<Json<WrapDetail>> {
    let wrap = owned_wrap(&state, &wrap_id, &user.user_id).await?;
    Ok(Json(detail_for(&state, wrap, &user.user_id).await?))
}

async fn delete_wrap(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(wrap_id): Path<String>,
) -> Result<StatusCode> {
    state.wraps.delete_wrap(&user.user_id, &wrap_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct VisibilityResponse {
    pub visibility: Visibility,
}

/// Flip a wrap between private and public.
async fn toggle_visibility(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(wrap_id): Path<String>,
) -> Result<Json<VisibilityResponse>> {
    let visibility = state
        .wraps
        .toggle_visibility(&user.user_id, &wrap_id)
        .await?;
    Ok(Json(VisibilityResponse { visibility }))
}

// ─── Feed ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedFilter {
    #[default]
    All,
    Liked,
    Following,
}

impl std::str::FromStr for FeedFilter {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(FeedFilter::All),
            "liked" => Ok(FeedFilter::Liked),
            "following" => Ok(FeedFilter::Following),
            other => Err(AppError::Validation(format!(
                "Invalid filter '{}': expected all, liked, or following",
                other
            ))),
        }
    }
}

#[derive(Deserialize)]
struct FeedQuery {
    filter: Option<String>,
}

/// One public wrap as seen by the requesting user.
#[derive(Serialize)]
pub struct FeedItem {
    pub id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub year: i32,
    pub created_at: String,
    #[serde(serialize_with = "serialize_or_empty")]
    pub top_artist: Option<String>,
    #[serde(serialize_with = "serialize_or_empty")]
    pub top_track: Option<String>,
    /// Distinct genres across the wrap's top artists.
    pub genre_count: u32,
    pub likes_count: u32,
    pub is_liked: bool,
    pub is_following: bool,
}

/// Public wraps, newest first, optionally narrowed to liked wraps or
/// wraps from followed users.
async fn get_feed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<FeedQuery>,
) -> Result<Json<Vec<FeedItem>>> {
    let filter = match params.filter.as_deref() {
        None | Some("") => FeedFilter::All,
        Some(raw) => raw.parse()?,
    };

    let liked: HashSet<String> = state
        .store
        .liked_wrap_ids(&user.user_id)
        .await?
        .into_iter()
        .collect();
    let following: HashSet<String> = state
        .store
        .following_ids(&user.user_id)
        .await?
        .into_iter()
        .collect();

    let mut wraps = match filter {
        FeedFilter::All => state.store.list_public_wraps(FEED_LIMIT).await?,
        FeedFilter::Liked => {
            let mut wraps = Vec::with_capacity(liked.len());
            for wrap_id in &liked {
                if let Some(wrap) = state.store.get_wrap(wrap_id).await? {
                    wraps.push(wrap);
                }
            }
            wraps
        }
        FeedFilter::Following => {
            let mut wraps = Vec::new();
            for followee_id in &following {
                wraps.extend(state.store.list_wraps_for_owner(followee_id).await?);
            }
            wraps
        }
    };

    wraps.retain(WrapSnapshot::is_public);
    wraps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    wraps.truncate(FEED_LIMIT as usize);

    let mut names: HashMap<String, String> = HashMap::new();
    let mut items = Vec::with_capacity(wraps.len());
    for wrap in wraps {
        let owner_name = match names.get(&wrap.owner_id) {
            Some(name) => name.clone(),
            None => {
                let name = owner_name(&state, &wrap.owner_id).await?;
                names.insert(wrap.owner_id.clone(), name.clone());
                name
            }
        };

        items.push(FeedItem {
            likes_count: state.store.count_likes(&wrap.id).await?,
            is_liked: liked.contains(&wrap.id),
            is_following: following.contains(&wrap.owner_id),
            owner_name,
            top_artist: wrap.payload.top_artist.map(|a| a.name),
            top_track: wrap.payload.top_track.map(|t| t.name),
            genre_count: wrap.payload.unique_genres_count,
            created_at: format_utc_rfc3339(wrap.created_at),
            year: wrap.year,
            owner_id: wrap.owner_id,
            id: wrap.id,
        });
    }

    Ok(Json(items))
}

/// Wrap detail for any wrap the caller may read: public ones and their own.
async fn get_feed_wrap(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(wrap_id): Path<String>,
) -> Result<Json<WrapDetail>> {
    let wrap = state
        .store
        .get_wrap(&wrap_id)
        .await?
        .filter(|wrap| wrap.visible_to(&user.user_id))
        .ok_or_else(|| AppError::NotFound(format!("Wrap {} not found", wrap_id)))?;

    Ok(Json(detail_for(&state, wrap, &user.user_id).await?))
}

// ─── Likes ───────────────────────────────────────────────────

#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes_count: u32,
}

async fn readable_wrap(state: &AppState, wrap_id: &str, user_id: &str) -> Result<WrapSnapshot> {
    state
        .store
        .get_wrap(wrap_id)
        .await?
        .filter(|wrap| wrap.visible_to(user_id))
        .ok_or_else(|| AppError::NotFound(format!("Wrap {} not found", wrap_id)))
}

async fn like_wrap(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(wrap_id): Path<String>,
) -> Result<Json<LikeResponse>> {
    let wrap = readable_wrap(&state, &wrap_id, &user.user_id).await?;
    if !wrap.is_public() {
        return Err(AppError::Forbidden("Only public wraps can be liked".to_string()));
    }

    state
        .store
        .add_like(&WrapLike {
            wrap_id: wrap.id.clone(),
            user_id: user.user_id.clone(),
            created_at: Utc::now(),
        })
        .await?;

    Ok(Json(LikeResponse {
        liked: true,
        likes_count: state.store.count_likes(&wrap.id).await?,
    }))
}

async fn unlike_wrap(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(wrap_id): Path<String>,
) -> Result<Json<LikeResponse>> {
    let wrap = readable_wrap(&state, &wrap_id, &user.user_id).await?;
    state.store.remove_like(&wrap.id, &user.user_id).await?;

    Ok(Json(LikeResponse {
        liked: false,
        likes_count: state.store.count_likes(&wrap.id).await?,
    }))
}

// ─── Follows ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct FollowResponse {
    pub following: bool,
}

async fn follow_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(followee_id): Path<String>,
) -> Result<Json<FollowResponse>> {
    if followee_id == user.user_id {
        return Err(AppError::Forbidden("Cannot follow yourself".to_string()));
    }
    if state.store.get_profile(&followee_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Profile {} not found",
            followee_id
        )));
    }

    state
        .store
        .add_follow(&Follow {
            follower_id: user.user_id.clone(),
            followee_id,
            created_at: Utc::now(),
        })
        .await?;

    Ok(Json(FollowResponse { following: true }))
}

async fn unfollow_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(followee_id): Path<String>,
) -> Result<Json<FollowResponse>> {
    if followee_id == user.user_id {
        return Err(AppError::Forbidden("Cannot unfollow yourself".to_string()));
    }
    state
        .store
        .remove_follow(&user.user_id, &followee_id)
        .await?;

    Ok(Json(FollowResponse { following: false }))
}
