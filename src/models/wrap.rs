// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wrap snapshot model: an immutable point-in-time yearly summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::music::{Album, Artist, GenreCount, TimeRange, Track};

/// Who can see a wrap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    pub fn toggled(self) -> Self {
        match self {
            Visibility::Private => Visibility::Public,
            Visibility::Public => Visibility::Private,
        }
    }
}

/// Stored wrap record in Firestore.
///
/// Only `visibility` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrapSnapshot {
    /// UUID (also used as document ID)
    pub id: String,
    /// Spotify user ID of the owner
    pub owner_id: String,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub time_range: TimeRange,
    pub payload: WrapPayload,
}

/// Derived listening data captured in a wrap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WrapPayload {
    pub top_artist: Option<Artist>,
    #[serde(default)]
    pub top_artists: Vec<Artist>,
    /// First album in the user's saved library. Spotify has no "top albums"
    /// endpoint, so this is not ranked by plays.
    pub approximated_top_album: Option<Album>,
    #[serde(default)]
    pub top_albums: Vec<Album>,
    pub top_track: Option<Track>,
    #[serde(default)]
    pub top_tracks: Vec<Track>,
    #[serde(default)]
    pub top_followed_artists: Vec<Artist>,
    #[serde(default)]
    pub top_genres: Vec<GenreCount>,
    /// Distinct genres across all fetched top artists, before truncation.
    #[serde(default)]
    pub unique_genres_count: u32,
    #[serde(default)]
    pub unique_artists_count: u32,
    #[serde(default)]
    pub unique_tracks_count: u32,
}

impl WrapSnapshot {
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Whether `user_id` may read this wrap.
    pub fn visible_to(&self, user_id: &str) -> bool {
        self.is_public() || self.owner_id == user_id
    }
}

/// Like join record, keyed by `{wrap_id}_{user_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrapLike {
    pub wrap_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl WrapLike {
    pub fn doc_id(wrap_id: &str, user_id: &str) -> String {
        format!(
            "{}_{}",
            urlencoding::encode(wrap_id),
            urlencoding::encode(user_id)
        )
    }
}

/// Follow join record, keyed by `{follower_id}_{followee_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: String,
    pub followee_id: String,
    pub created_at: DateTime<Utc>,
}

impl Follow {
    pub fn doc_id(follower_id: &str, followee_id: &str) -> String {
        format!(
            "{}_{}",
            urlencoding::encode(follower_id),
            urlencoding::encode(followee_id)
        )
    }
}
