// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles (cached Spotify state)
//! - Credentials (encrypted OAuth tokens)
//! - Wraps (immutable snapshots)
//! - Wrap likes and follows (join collections)

use async_trait::async_trait;
use futures_util::{stream, StreamExt};

use crate::db::{collections, Store};
use crate::error::AppError;
use crate::models::{Follow, Profile, StoredCredential, Visibility, WrapLike, WrapSnapshot};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn likes_for_wrap(&self, wrap_id: &str) -> Result<Vec<WrapLike>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::WRAP_LIKES)
            .filter(|q| q.for_all([q.field("wrap_id").eq(wrap_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    async fn delete_doc(&self, collection: &str, doc_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(doc_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── Profile Operations ──────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile.external_user_id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Credential Operations ───────────────────────────────────

    async fn get_credential(&self, user_id: &str) -> Result<Option<StoredCredential>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_credential(
        &self,
        user_id: &str,
        credential: &StoredCredential,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(user_id)
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_credential(&self, user_id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::CREDENTIALS, user_id).await
    }

    // ─── Wrap Operations ─────────────────────────────────────────

    async fn insert_wrap(&self, wrap: &WrapSnapshot) -> Result<(), AppError> {
        // insert() rejects an existing document ID, so wraps stay append-only.
        let _: () = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::WRAPS)
            .document_id(&wrap.id)
            .object(wrap)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_wrap(&self, wrap_id: &str) -> Result<Option<WrapSnapshot>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::WRAPS)
            .obj()
            .one(wrap_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_wraps_for_owner(&self, owner_id: &str) -> Result<Vec<WrapSnapshot>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::WRAPS)
            .filter(|q| q.for_all([q.field("owner_id").eq(owner_id)]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_public_wraps(&self, limit: u32) -> Result<Vec<WrapSnapshot>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::WRAPS)
            .filter(|q| q.for_all([q.field("visibility").eq("public")]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_wrap_visibility(
        &self,
        wrap_id: &str,
        visibility: Visibility,
    ) -> Result<bool, AppError> {
        let Some(mut wrap) = self.get_wrap(wrap_id).await? else {
            return Ok(false);
        };
        wrap.visibility = visibility;

        // Only the visibility field is written, and only onto an existing
        // document, so a concurrent delete is never undone.
        let result: Result<(), firestore::errors::FirestoreError> = self
            .get_client()?
            .fluent()
            .update()
            .fields(firestore::paths!(WrapSnapshot::{ visibility }))
            .in_col(collections::WRAPS)
            .precondition(firestore::FirestoreWritePrecondition::Exists(true))
            .document_id(wrap_id)
            .object(&wrap)
            .execute()
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(firestore::errors::FirestoreError::DataNotFoundError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn delete_wrap(&self, wrap_id: &str) -> Result<(), AppError> {
        let likes = self.likes_for_wrap(wrap_id).await?;
        self.batch_delete(&likes, collections::WRAP_LIKES, |like: &WrapLike| {
            WrapLike::doc_id(&like.wrap_id, &like.user_id)
        })
        .await?;

        self.delete_doc(collections::WRAPS, wrap_id).await
    }

    // ─── Like Operations ─────────────────────────────────────────

    async fn add_like(&self, like: &WrapLike) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::WRAP_LIKES)
            .document_id(WrapLike::doc_id(&like.wrap_id, &like.user_id))
            .object(like)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn remove_like(&self, wrap_id: &str, user_id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::WRAP_LIKES, &WrapLike::doc_id(wrap_id, user_id))
            .await
    }

    async fn count_likes(&self, wrap_id: &str) -> Result<u32, AppError> {
        Ok(self.likes_for_wrap(wrap_id).await?.len() as u32)
    }

    async fn liked_wrap_ids(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let likes: Vec<WrapLike> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::WRAP_LIKES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(likes.into_iter().map(|like| like.wrap_id).collect())
    }

    // ─── Follow Operations ───────────────────────────────────────

    async fn add_follow(&self, follow: &Follow) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::FOLLOWS)
            .document_id(Follow::doc_id(&follow.follower_id, &follow.followee_id))
            .object(follow)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn remove_follow(&self, follower_id: &str, followee_id: &str) -> Result<(), AppError> {
        self.delete_doc(
            collections::FOLLOWS,
            &Follow::doc_id(follower_id, followee_id),
        )
        .await
    }

    async fn following_ids(&self, follower_id: &str) -> Result<Vec<String>, AppError> {
        let follows: Vec<Follow> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::FOLLOWS)
            .filter(|q| q.for_all([q.field("follower_id").eq(follower_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(follows.into_iter().map(|f| f.followee_id).collect())
    }

    // ─── User Data Deletion ──────────────────────────────────────

    async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // 1. Likes on the user's wraps, then the wraps themselves
        let wraps = self.list_wraps_for_owner(user_id).await?;
        let wrap_ids: Vec<String> = wraps.iter().map(|w| w.id.clone()).collect();
        let wrap_likes: Vec<WrapLike> = stream::iter(wrap_ids)
            .map(|wrap_id| async move { self.likes_for_wrap(&wrap_id).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Vec<WrapLike>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<Vec<WrapLike>>, AppError>>()?
            .into_iter()
            .flatten()
            .collect();

        self.batch_delete(&wrap_likes, collections::WRAP_LIKES, |like: &WrapLike| {
            WrapLike::doc_id(&like.wrap_id, &like.user_id)
        })
        .await?;
        deleted_count += wrap_likes.len();

        self.batch_delete(&wraps, collections::WRAPS, |wrap: &WrapSnapshot| {
            wrap.id.clone()
        })
        .await?;
        deleted_count += wraps.len();
        tracing::debug!(user_id, count = wraps.len(), "Deleted wraps");

        // 2. Likes the user gave on other wraps
        let given: Vec<WrapLike> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::WRAP_LIKES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.batch_delete(&given, collections::WRAP_LIKES, |like: &WrapLike| {
            WrapLike::doc_id(&like.wrap_id, &like.user_id)
        })
        .await?;
        deleted_count += given.len();

        // 3. Follows in both directions
        for field in ["follower_id", "followee_id"] {
            let follows: Vec<Follow> = self
                .get_client()?
                .fluent()
                .select()
                .from(collections::FOLLOWS)
                .filter(|q| q.for_all([q.field(field).eq(user_id)]))
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            self.batch_delete(&follows, collections::FOLLOWS, |f: &Follow| {
                Follow::doc_id(&f.follower_id, &f.followee_id)
            })
            .await?;
            deleted_count += follows.len();
        }

        // 4. Credential and profile
        self.delete_doc(collections::CREDENTIALS, user_id).await?;
        self.delete_doc(collections::PROFILES, user_id).await?;
        deleted_count += 2;

        tracing::info!(user_id, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}
