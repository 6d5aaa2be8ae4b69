// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cached Spotify profile for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::music::{Artist, GenreCount, PlayHistoryItem, Track};

/// User profile stored in Firestore, keyed by Spotify user ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Spotify user ID (also used as document ID)
    pub external_user_id: String,
    pub display_name: Option<String>,
    /// Email address (only present with the `user-read-email` scope)
    pub email: Option<String>,
    pub country: Option<String>,
    /// Subscription tier ("premium", "free", ...)
    pub tier: Option<String>,

    /// Aggregates from the last complete sync pass.
    #[serde(default)]
    pub aggregates: ProfileAggregates,
    /// When `aggregates` were last replaced
    pub last_synced_at: Option<DateTime<Utc>>,

    /// When user first connected
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// Cached aggregate fields. Always replaced as a whole so values from
/// different sync passes never mix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileAggregates {
    #[serde(default)]
    pub top_artists: Vec<Artist>,
    #[serde(default)]
    pub top_tracks: Vec<Track>,
    #[serde(default)]
    pub top_genres: Vec<GenreCount>,
    #[serde(default)]
    pub recently_played: Vec<PlayHistoryItem>,
    #[serde(default)]
    pub saved_tracks_count: u32,
    #[serde(default)]
    pub saved_albums_count: u32,
    #[serde(default)]
    pub playlist_count: u32,
    #[serde(default)]
    pub followed_artists_count: u32,
}

impl Profile {
    /// A fresh profile with identity fields only.
    pub fn new(external_user_id: String, now: DateTime<Utc>) -> Self {
        Self {
            external_user_id,
            display_name: None,
            email: None,
            country: None,
            tier: None,
            aggregates: ProfileAggregates::default(),
            last_synced_at: None,
            created_at: now,
            last_login: now,
        }
    }

    /// Name to show other users.
    pub fn public_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.external_user_id)
    }
}
