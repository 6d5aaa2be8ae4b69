// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for tests and local development.
//!
//! Same keying and semantics as the Firestore collections.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Follow, Profile, StoredCredential, Visibility, WrapLike, WrapSnapshot};

/// DashMap-backed [`Store`]. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryDb {
    profiles: Arc<DashMap<String, Profile>>,
    credentials: Arc<DashMap<String, StoredCredential>>,
    wraps: Arc<DashMap<String, WrapSnapshot>>,
    likes: Arc<DashMap<String, WrapLike>>,
    follows: Arc<DashMap<String, Follow>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut wraps: Vec<WrapSnapshot>) -> Vec<WrapSnapshot> {
        wraps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        wraps
    }
}

#[async_trait]
impl Store for MemoryDb {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        Ok(self.profiles.get(user_id).map(|p| p.clone()))
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        self.profiles
            .insert(profile.external_user_id.clone(), profile.clone());
        Ok(())
    }

    async fn get_credential(&self, user_id: &str) -> Result<Option<StoredCredential>, AppError> {
        Ok(self.credentials.get(user_id).map(|c| c.clone()))
    }

    async fn set_credential(
        &self,
        user_id: &str,
        credential: &StoredCredential,
    ) -> Result<(), AppError> {
        self.credentials
            .insert(user_id.to_string(), credential.clone());
        Ok(())
    }

    async fn delete_credential(&self, user_id: &str) -> Result<(), AppError> {
        self.credentials.remove(user_id);
        Ok(())
    }

    async fn insert_wrap(&self, wrap: &WrapSnapshot) -> Result<(), AppError> {
        use dashmap::mapref::entry::Entry;

        match self.wraps.entry(wrap.id.clone()) {
            Entry::Occupied(_) => Err(AppError::Database(format!(
                "Wrap {} already exists",
                wrap.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(wrap.clone());
                Ok(())
            }
        }
    }

    async fn get_wrap(&self, wrap_id: &str) -> Result<Option<WrapSnapshot>, AppError> {
        Ok(self.wraps.get(wrap_id).map(|w| w.clone()))
    }

    async fn list_wraps_for_owner(&self, owner_id: &str) -> Result<Vec<WrapSnapshot>, AppError> {
        let wraps = self
            .wraps
            .iter()
            .filter(|w| w.owner_id == owner_id)
            .map(|w| w.clone())
            .collect();
        Ok(Self::newest_first(wraps))
    }

    async fn list_public_wraps(&self, limit: u32) -> Result<Vec<WrapSnapshot>, AppError> {
        let wraps = self
            .wraps
            .iter()
            .filter(|w| w.is_public())
            .map(|w| w.clone())
            .collect();
        let mut wraps = Self::newest_first(wraps);
        wraps.truncate(limit as usize);
        Ok(wraps)
    }

    async fn set_wrap_visibility(
        &self,
        wrap_id: &str,
        visibility: Visibility,
    ) -> Result<bool, AppError> {
        match self.wraps.get_mut(wrap_id) {
            Some(mut wrap) => {
                wrap.visibility = visibility;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_wrap(&self, wrap_id: &str) -> Result<(), AppError> {
        self.likes.retain(|_, like| like.wrap_id != wrap_id);
        self.wraps.remove(wrap_id);
        Ok(())
    }

    async fn add_like(&self, like: &WrapLike) -> Result<(), AppError> {
        self.likes
            .insert(WrapLike::doc_id(&like.wrap_id, &like.user_id), like.clone());
        Ok(())
    }

    async fn remove_like(&self, wrap_id: &str, user_id: &str) -> Result<(), AppError> {
        self.likes.remove(&WrapLike::doc_id(wrap_id, user_id));
        Ok(())
    }

    async fn count_likes(&self, wrap_id: &str) -> Result<u32, AppError> {
        Ok(self.likes.iter().filter(|l| l.wrap_id == wrap_id).count() as u32)
    }

    async fn liked_wrap_ids(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .likes
            .iter()
            .filter(|l| l.user_id == user_id)
            .map(|l| l.wrap_id.clone())
            .collect())
    }

    async fn add_follow(&self, follow: &Follow) -> Result<(), AppError> {
        self.follows.insert(
            Follow::doc_id(&follow.follower_id, &follow.followee_id),
            follow.clone(),
        );
        Ok(())
    }

    async fn remove_follow(&self, follower_id: &str, followee_id: &str) -> Result<(), AppError> {
        self.follows
            .remove(&Follow::doc_id(follower_id, followee_id));
        Ok(())
    }

    async fn following_ids(&self, follower_id: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .follows
            .iter()
            .filter(|f| f.follower_id == follower_id)
            .map(|f| f.followee_id.clone())
            .collect())
    }

    async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        let owned: Vec<String> = self
            .wraps
            .iter()
            .filter(|w| w.owner_id == user_id)
            .map(|w| w.id.clone())
            .collect();

        let mut deleted_count = 0;
        self.likes.retain(|_, like| {
            let keep = like.user_id != user_id && !owned.contains(&like.wrap_id);
            if !keep {
                deleted_count += 1;
            }
            keep
        });
        self.follows.retain(|_, f| {
            let keep = f.follower_id != user_id && f.followee_id != user_id;
            if !keep {
                deleted_count += 1;
            }
            keep
        });

        for id in &owned {
            if self.wraps.remove(id).is_some() {
                deleted_count += 1;
            }
        }

        if self.credentials.remove(user_id).is_some() {
            deleted_count += 1;
        }
        if self.profiles.remove(user_id).is_some() {
            deleted_count += 1;
        }

        tracing::info!(user_id, deleted_count, "User data deletion complete");
        Ok(deleted_count)
    }
}
