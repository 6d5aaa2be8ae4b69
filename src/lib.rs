// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify Unwrapped: yearly listening summaries built from Spotify data.
//!
//! This crate provides the backend API: Spotify OAuth, cached profile sync,
//! wrap snapshots, and the public feed with likes and follows.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use dashmap::DashMap;

use config::Config;
use db::Store;
use error::AppError;
use services::{ProfileSync, SpotifyClient, TokenCipher, TokenManager, WrapBuilder};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub spotify: SpotifyClient,
    pub tokens: TokenManager,
    pub wraps: WrapBuilder,
    pub sync: ProfileSync,
}

impl AppState {
    /// Wire up services over `store`.
    ///
    /// The credential refresh locks live inside [`TokenManager`]; profile and
    /// wrap writes share a separate lock map so a write can trigger a refresh.
    pub fn new(config: Config, store: Arc<dyn Store>) -> Result<Self, AppError> {
        let spotify = SpotifyClient::new(&config)?;
        let cipher = TokenCipher::new(&config.token_encryption_key)?;
        let tokens = TokenManager::new(spotify.clone(), store.clone(), cipher);

        let write_locks = Arc::new(DashMap::new());
        let wraps = WrapBuilder::new(
            spotify.clone(),
            tokens.clone(),
            store.clone(),
            write_locks.clone(),
        );
        let sync = ProfileSync::new(spotify.clone(), tokens.clone(), store.clone(), write_locks);

        Ok(Self {
            config,
            store,
            spotify,
            tokens,
            wraps,
            sync,
        })
    }
}
