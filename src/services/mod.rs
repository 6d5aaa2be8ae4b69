// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregate;
pub mod cipher;
pub mod spotify;
pub mod sync;
pub mod tokens;
pub mod wrap;

pub use cipher::TokenCipher;
pub use spotify::{Fetched, SpotifyClient};
pub use sync::{ProfileSync, SyncOutcome};
pub use tokens::{TokenManager, UserLocks};
pub use wrap::{WrapBuilder, WrapOptions, WrapPreview};
