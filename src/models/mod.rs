// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credential;
pub mod music;
pub mod profile;
pub mod wrap;

pub use credential::{Credential, StoredCredential};
pub use music::{Album, Artist, GenreCount, PlayHistoryItem, TimeRange, Track};
pub use profile::{Profile, ProfileAggregates};
pub use wrap::{Follow, Visibility, WrapLike, WrapPayload, WrapSnapshot};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Serialize `None` as `{}` so API consumers always get an object for
/// single-item fields.
pub fn serialize_or_empty<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(inner) => inner.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}
