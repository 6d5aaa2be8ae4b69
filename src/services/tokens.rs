// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle: load, refresh-before-use, persist rotated tokens.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::db::Store;
use crate::error::AppError;
use crate::models::Credential;
use crate::services::cipher::TokenCipher;
use crate::services::spotify::SpotifyClient;

/// Decrypted credentials, keyed by user ID.
pub type CredentialCache = Arc<DashMap<String, Credential>>;

/// Per-user async mutexes.
pub type UserLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Get (or create) the mutex for `user_id`.
pub fn lock_for(locks: &UserLocks, user_id: &str) -> Arc<Mutex<()>> {
    locks
        .entry(user_id.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Manages the Spotify credential for each user.
///
/// Refresh is single-flight per user: the read-check-refresh-write sequence
/// runs under a per-user lock, and the stored credential is re-read after
/// the lock is acquired.
#[derive(Clone)]
pub struct TokenManager {
    client: SpotifyClient,
    store: Arc<dyn Store>,
    cipher: TokenCipher,
    cache: CredentialCache,
    refresh_locks: UserLocks,
}

impl TokenManager {
    pub fn new(client: SpotifyClient, store: Arc<dyn Store>, cipher: TokenCipher) -> Self {
        Self {
            client,
            store,
            cipher,
            cache: Arc::new(DashMap::new()),
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// A valid access token for `user_id`, refreshing if needed.
    pub async fn access_token(&self, user_id: &str) -> Result<String, AppError> {
        Ok(self.valid_credential(user_id).await?.access_token)
    }

    /// The user's credential, refreshed if expired or about to expire.
    pub async fn valid_credential(&self, user_id: &str) -> Result<Credential, AppError> {
        if let Some(cached) = self.cache.get(user_id) {
            if !cached.needs_refresh(Utc::now()) {
                return Ok(cached.clone());
            }
        }

        let credential = self.load(user_id).await?.ok_or(AppError::Unauthorized)?;
        self.ensure_valid(user_id, credential).await
    }

    /// Return `credential` unchanged if it is still valid. Otherwise issue
    /// one refresh call, persist the result, and return it.
    pub async fn ensure_valid(
        &self,
        user_id: &str,
        credential: Credential,
    ) -> Result<Credential, AppError> {
        if !credential.needs_refresh(Utc::now()) {
            return Ok(credential);
        }

        let lock = lock_for(&self.refresh_locks, user_id);
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        if let Some(current) = self.adopt_stored(user_id, &credential).await? {
            return Ok(current);
        }

        if credential.refresh_token.is_empty() {
            return Err(AppError::TokenRefreshFailed(
                "No refresh token available".to_string(),
            ));
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let response = match self.client.refresh_token(&credential.refresh_token).await {
            Ok(response) => response,
            Err(AppError::TokenRefreshFailed(ref msg)) if msg.contains("invalid_grant") => {
                // Another instance may have rotated the refresh token first.
                if let Some(current) = self.adopt_stored(user_id, &credential).await? {
                    tracing::info!(
                        user_id,
                        "Refresh token race detected, using credential stored by the winner"
                    );
                    return Ok(current);
                }
                tracing::warn!(user_id, "Refresh token rejected (invalid_grant)");
                return Err(AppError::TokenRefreshFailed(msg.clone()));
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token refresh failed");
                return Err(e);
            }
        };

        let refreshed = credential.rotated(response, Utc::now())?;
        self.store_credential(user_id, &refreshed).await?;

        tracing::info!(user_id, "Token refreshed and cached");
        Ok(refreshed)
    }

    /// Encrypt and persist a credential, then cache it.
    pub async fn store_credential(
        &self,
        user_id: &str,
        credential: &Credential,
    ) -> Result<(), AppError> {
        let stored = self.cipher.seal_credential(credential, user_id)?;
        self.store.set_credential(user_id, &stored).await?;
        self.cache.insert(user_id.to_string(), credential.clone());
        Ok(())
    }

    /// Read and decrypt the stored credential, bypassing the cache.
    pub async fn load(&self, user_id: &str) -> Result<Option<Credential>, AppError> {
        match self.store.get_credential(user_id).await? {
            Some(stored) => Ok(Some(self.cipher.open_credential(&stored, user_id)?)),
            None => Ok(None),
        }
    }

    /// Drop cached state for a user (account deletion).
    pub fn forget(&self, user_id: &str) {
        self.cache.remove(user_id);
        self.refresh_locks.remove(user_id);
    }

    /// The stored credential, if it differs from `stale` and is valid.
    async fn adopt_stored(
        &self,
        user_id: &str,
        stale: &Credential,
    ) -> Result<Option<Credential>, AppError> {
        let Some(current) = self.load(user_id).await? else {
            return Ok(None);
        };

        if current.access_token != stale.access_token && !current.needs_refresh(Utc::now()) {
            self.cache.insert(user_id.to_string(), current.clone());
            return Ok(Some(current));
        }

        Ok(None)
    }
}
