// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wrap snapshot builder.
//!
//! A build makes sequential best-effort fetches, derives aggregates and
//! inserts one new immutable record. Only a credential failure aborts.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use serde::Serialize;

use crate::db::Store;
use crate::error::AppError;
use crate::models::{serialize_or_empty, TimeRange, Visibility, WrapPayload, WrapSnapshot};
use crate::services::aggregate::{self, PREVIEW_GENRE_LIMIT, WRAP_GENRE_LIMIT};
use crate::services::spotify::SpotifyClient;
use crate::services::tokens::{lock_for, TokenManager, UserLocks};

/// Default number of top items requested per list.
pub const DEFAULT_WRAP_LIMIT: u32 = 20;
/// Saved albums requested when approximating the top album.
const SAVED_ALBUMS_LIMIT: u32 = 20;
/// Followed artists requested per build.
const FOLLOWED_ARTISTS_LIMIT: u32 = 20;
/// Track names in a preview.
const PREVIEW_TRACK_LIMIT: usize = 5;

/// Caller-selected build parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapOptions {
    pub time_range: TimeRange,
    pub limit: u32,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            time_range: TimeRange::LongTerm,
            limit: DEFAULT_WRAP_LIMIT,
        }
    }
}

/// Summary returned right after a build.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WrapPreview {
    #[serde(serialize_with = "serialize_or_empty")]
    pub top_artist: Option<String>,
    #[serde(serialize_with = "serialize_or_empty")]
    pub top_track: Option<String>,
    #[serde(serialize_with = "serialize_or_empty")]
    pub top_album: Option<String>,
    pub top_genres: Vec<String>,
    pub top_tracks: Vec<String>,
}

impl WrapPreview {
    pub fn from_payload(payload: &WrapPayload) -> Self {
        Self {
            top_artist: payload.top_artist.as_ref().map(|a| a.name.clone()),
            top_track: payload.top_track.as_ref().map(|t| t.name.clone()),
            top_album: payload
                .approximated_top_album
                .as_ref()
                .map(|a| a.name.clone()),
            top_genres: payload
                .top_genres
                .iter()
                .take(PREVIEW_GENRE_LIMIT)
                .map(|g| g.name.clone())
                .collect(),
            top_tracks: payload
                .top_tracks
                .iter()
                .take(PREVIEW_TRACK_LIMIT)
                .map(|t| t.name.clone())
                .collect(),
        }
    }
}

/// Builds and persists wraps.
#[derive(Clone)]
pub struct WrapBuilder {
    client: SpotifyClient,
    tokens: TokenManager,
    store: Arc<dyn Store>,
    write_locks: UserLocks,
}

impl WrapBuilder {
    pub fn new(
        client: SpotifyClient,
        tokens: TokenManager,
        store: Arc<dyn Store>,
        write_locks: UserLocks,
    ) -> Self {
        Self {
            client,
            tokens,
            store,
            write_locks,
        }
    }

    /// Build a new wrap for `user_id` and insert it. Earlier wraps are
    /// never touched.
    pub async fn build_wrap(
        &self,
        user_id: &str,
        options: WrapOptions,
    ) -> Result<WrapSnapshot, AppError> {
        let lock = lock_for(&self.write_locks, user_id);
        let _guard = lock.lock().await;

        let access_token = self.tokens.access_token(user_id).await?;

        let top_artists = self
            .client
            .top_artists(&access_token, options.time_range, options.limit)
            .await
            .unwrap_or_default()
            .items;
        let top_tracks = self
            .client
            .top_tracks(&access_token, options.time_range, options.limit)
            .await
            .unwrap_or_default()
            .items;
        let saved_albums: Vec<_> = self
            .client
            .saved_albums(&access_token, SAVED_ALBUMS_LIMIT)
            .await
            .unwrap_or_default()
            .items
            .into_iter()
            .map(|saved| saved.album)
            .collect();
        let followed = self
            .client
            .followed_artists(&access_token, FOLLOWED_ARTISTS_LIMIT)
            .await
            .unwrap_or_default()
            .items;

        let payload = assemble_payload(top_artists, top_tracks, saved_albums, followed);

        let now = Utc::now();
        let wrap = WrapSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: user_id.to_string(),
            year: now.year(),
            created_at: now,
            visibility: Visibility::Private,
            time_range: options.time_range,
            payload,
        };

        self.store.insert_wrap(&wrap).await?;

        tracing::info!(
            user_id,
            wrap_id = %wrap.id,
            artists = wrap.payload.top_artists.len(),
            tracks = wrap.payload.top_tracks.len(),
            genres = wrap.payload.unique_genres_count,
            "Wrap created"
        );

        Ok(wrap)
    }

    /// Flip one of `user_id`'s wraps between private and public and return
    /// the new value.
    pub async fn toggle_visibility(
        &self,
        user_id: &str,
        wrap_id: &str,
    ) -> Result<Visibility, AppError> {
        let lock = lock_for(&self.write_locks, user_id);
        let _guard = lock.lock().await;

        let wrap = self.owned_wrap(user_id, wrap_id).await?;
        let visibility = wrap.visibility.toggled();
        if !self.store.set_wrap_visibility(&wrap.id, visibility).await? {
            return Err(wrap_not_found(wrap_id));
        }

        tracing::info!(user_id, wrap_id, ?visibility, "Visibility changed");
        Ok(visibility)
    }

    /// Delete one of `user_id`'s wraps along with its likes.
    pub async fn delete_wrap(&self, user_id: &str, wrap_id: &str) -> Result<(), AppError> {
        let lock = lock_for(&self.write_locks, user_id);
        let _guard = lock.lock().await;

        let wrap = self.owned_wrap(user_id, wrap_id).await?;
        self.store.delete_wrap(&wrap.id).await?;

        tracing::info!(user_id, wrap_id, "Wrap deleted");
        Ok(())
    }

    /// Remove every document belonging to `user_id` and drop cached tokens.
    /// Returns the number of documents deleted.
    pub async fn delete_account(&self, user_id: &str) -> Result<usize, AppError> {
        let lock = lock_for(&self.write_locks, user_id);
        let _guard = lock.lock().await;

        let deleted = self.store.delete_user_data(user_id).await?;
        self.tokens.forget(user_id);
        Ok(deleted)
    }

    /// Wraps owned by someone else look absent.
    async fn owned_wrap(&self, user_id: &str, wrap_id: &str) -> Result<WrapSnapshot, AppError> {
        self.store
            .get_wrap(wrap_id)
            .await?
            .filter(|wrap| wrap.owner_id == user_id)
            .ok_or_else(|| wrap_not_found(wrap_id))
    }
}

fn wrap_not_found(wrap_id: &str) -> AppError {
    AppError::NotFound(format!("Wrap {} not found", wrap_id))
}

fn assemble_payload(
    top_artists: Vec<crate::models::Artist>,
    top_tracks: Vec<crate::models::Track>,
    saved_albums: Vec<crate::models::Album>,
    followed: Vec<crate::models::Artist>,
) -> WrapPayload {
    WrapPayload {
        top_artist: aggregate::top_single(&top_artists),
        approximated_top_album: aggregate::approximated_top_album(&saved_albums),
        top_track: aggregate::top_single(&top_tracks),
        top_followed_artists: aggregate::top_followed(&followed),
        top_genres: aggregate::top_genres(&top_artists, WRAP_GENRE_LIMIT),
        unique_genres_count: aggregate::unique_genres_count(&top_artists),
        unique_artists_count: aggregate::unique_artists_count(&top_artists),
        unique_tracks_count: aggregate::unique_tracks_count(&top_tracks),
        top_artists,
        top_albums: saved_albums,
        top_tracks,
    }
}
