// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! [`Store`] is the persistence seam. [`FirestoreDb`] backs production and
//! [`MemoryDb`] backs tests and local development.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{Follow, Profile, StoredCredential, Visibility, WrapLike, WrapSnapshot};

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    pub const CREDENTIALS: &str = "credentials";
    pub const WRAPS: &str = "wraps";
    /// Like join records (keyed by `{wrap_id}_{user_id}`)
    pub const WRAP_LIKES: &str = "wrap_likes";
    /// Follow join records (keyed by `{follower_id}_{followee_id}`)
    pub const FOLLOWS: &str = "follows";
}

/// Typed persistence operations used by services and handlers.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Profiles ────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError>;

    // ─── Credentials ─────────────────────────────────────────────

    async fn get_credential(&self, user_id: &str) -> Result<Option<StoredCredential>, AppError>;

    async fn set_credential(
        &self,
        user_id: &str,
        credential: &StoredCredential,
    ) -> Result<(), AppError>;

    async fn delete_credential(&self, user_id: &str) -> Result<(), AppError>;

    // ─── Wraps ───────────────────────────────────────────────────

    /// Insert a new wrap. Fails if a wrap with the same ID exists.
    async fn insert_wrap(&self, wrap: &WrapSnapshot) -> Result<(), AppError>;

    async fn get_wrap(&self, wrap_id: &str) -> Result<Option<WrapSnapshot>, AppError>;

    /// All wraps owned by a user, newest first.
    async fn list_wraps_for_owner(&self, owner_id: &str) -> Result<Vec<WrapSnapshot>, AppError>;

    /// Public wraps from all users, newest first.
    async fn list_public_wraps(&self, limit: u32) -> Result<Vec<WrapSnapshot>, AppError>;

    /// Change visibility. Returns `false` if the wrap does not exist.
    async fn set_wrap_visibility(
        &self,
        wrap_id: &str,
        visibility: Visibility,
    ) -> Result<bool, AppError>;

    /// Delete a wrap and every like on it.
    async fn delete_wrap(&self, wrap_id: &str) -> Result<(), AppError>;

    // ─── Likes ───────────────────────────────────────────────────

    /// Record a like. Liking twice leaves a single record.
    async fn add_like(&self, like: &WrapLike) -> Result<(), AppError>;

    async fn remove_like(&self, wrap_id: &str, user_id: &str) -> Result<(), AppError>;

    async fn count_likes(&self, wrap_id: &str) -> Result<u32, AppError>;

    /// IDs of wraps the user has liked.
    async fn liked_wrap_ids(&self, user_id: &str) -> Result<Vec<String>, AppError>;

    // ─── Follows ─────────────────────────────────────────────────

    /// Record a follow. Following twice leaves a single record.
    async fn add_follow(&self, follow: &Follow) -> Result<(), AppError>;

    async fn remove_follow(&self, follower_id: &str, followee_id: &str) -> Result<(), AppError>;

    /// IDs of users `follower_id` follows.
    async fn following_ids(&self, follower_id: &str) -> Result<Vec<String>, AppError>;

    // ─── Account Deletion ────────────────────────────────────────

    /// Delete every document belonging to a user: credential, profile,
    /// wraps (with their likes), likes given, and follows in both
    /// directions. Returns the number of documents deleted.
    async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError>;
}
