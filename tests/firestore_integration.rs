// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Set FIRESTORE_EMULATOR_HOST to run them; otherwise they are skipped.
//!
//! IDs are unique per run so tests do not see each other's documents.

use chrono::{Duration, Utc};
use spotify_unwrapped::db::Store;
use spotify_unwrapped::models::{
    Artist, Follow, Profile, StoredCredential, TimeRange, Visibility, WrapLike, WrapPayload,
    WrapSnapshot,
};

mod common;
use common::test_db;

/// Generate a unique ID for test isolation.
fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

fn test_wrap(id: &str, owner: &str, visibility: Visibility, age_mins: i64) -> WrapSnapshot {
    WrapSnapshot {
        id: id.to_string(),
        owner_id: owner.to_string(),
        year: 2026,
        created_at: Utc::now() - Duration::minutes(age_mins),
        visibility,
        time_range: TimeRange::MediumTerm,
        payload: WrapPayload {
            top_artist: Some(Artist {
                id: "a1".to_string(),
                name: "Artist".to_string(),
                genres: vec!["rock".to_string()],
                ..Default::default()
            }),
            unique_genres_count: 1,
            ..Default::default()
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PROFILE & CREDENTIAL TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_profile_upsert_roundtrip() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");

    assert!(db.get_profile(&user_id).await.unwrap().is_none());

    let mut profile = Profile::new(user_id.clone(), Utc::now());
    profile.display_name = Some("Listener".to_string());
    profile.aggregates.saved_tracks_count = 42;
    db.upsert_profile(&profile).await.unwrap();

    let fetched = db.get_profile(&user_id).await.unwrap().unwrap();
    assert_eq!(fetched.display_name.as_deref(), Some("Listener"));
    assert_eq!(fetched.aggregates.saved_tracks_count, 42);

    profile.display_name = Some("Renamed".to_string());
    db.upsert_profile(&profile).await.unwrap();
    let fetched = db.get_profile(&user_id).await.unwrap().unwrap();
    assert_eq!(fetched.display_name.as_deref(), Some("Renamed"));
}

#[tokio::test]
async fn test_credential_set_and_delete() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");

    let stored = StoredCredential {
        access_token_encrypted: "ciphertext-a".to_string(),
        refresh_token_encrypted: "ciphertext-r".to_string(),
        expires_at: "2026-10-14T12:00:00Z".to_string(),
        scopes: vec!["user-top-read".to_string()],
    };
    db.set_credential(&user_id, &stored).await.unwrap();

    let fetched = db.get_credential(&user_id).await.unwrap().unwrap();
    assert_eq!(fetched.access_token_encrypted, "ciphertext-a");
    assert_eq!(fetched.scopes, vec!["user-top-read"]);

    db.delete_credential(&user_id).await.unwrap();
    assert!(db.get_credential(&user_id).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// WRAP TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_wrap_insert_is_create_only() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_id("owner");
    let wrap_id = unique_id("wrap");

    db.insert_wrap(&test_wrap(&wrap_id, &owner, Visibility::Private, 0))
        .await
        .unwrap();
    assert!(db
        .insert_wrap(&test_wrap(&wrap_id, &owner, Visibility::Public, 0))
        .await
        .is_err());

    let fetched = db.get_wrap(&wrap_id).await.unwrap().unwrap();
    assert_eq!(fetched.visibility, Visibility::Private);
    assert_eq!(fetched.payload.top_artist.unwrap().name, "Artist");
}

#[tokio::test]
async fn test_wraps_for_owner_newest_first() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_id("owner");
    let old = unique_id("old");
    let new = unique_id("new");

    db.insert_wrap(&test_wrap(&old, &owner, Visibility::Private, 60))
        .await
        .unwrap();
    db.insert_wrap(&test_wrap(&new, &owner, Visibility::Public, 1))
        .await
        .unwrap();

    let wraps = db.list_wraps_for_owner(&owner).await.unwrap();
    let ids: Vec<&str> = wraps.iter().map(|w| w.id.as_str()).collect();
    assert_eq!(ids, vec![new.as_str(), old.as_str()]);
}

#[tokio::test]
async fn test_visibility_update() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_id("owner");
    let wrap_id = unique_id("wrap");
    db.insert_wrap(&test_wrap(&wrap_id, &owner, Visibility::Private, 0))
        .await
        .unwrap();

    assert!(db
        .set_wrap_visibility(&wrap_id, Visibility::Public)
        .await
        .unwrap());
    let updated = db.get_wrap(&wrap_id).await.unwrap().unwrap();
    assert!(updated.is_public());
    // Only visibility is written; the snapshot itself is untouched.
    assert_eq!(updated.payload.top_artist.unwrap().name, "Artist");
    assert_eq!(updated.payload.unique_genres_count, 1);

    let public = db.list_public_wraps(50).await.unwrap();
    assert!(public.iter().any(|w| w.id == wrap_id));

    assert!(!db
        .set_wrap_visibility(&unique_id("missing"), Visibility::Public)
        .await
        .unwrap());
}

// ═══════════════════════════════════════════════════════════════════════════
// LIKES, FOLLOWS & DELETION
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_likes_are_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let wrap_id = unique_id("wrap");
    let user_id = unique_id("fan");
    let like = WrapLike {
        wrap_id: wrap_id.clone(),
        user_id: user_id.clone(),
        created_at: Utc::now(),
    };

    db.add_like(&like).await.unwrap();
    db.add_like(&like).await.unwrap();
    assert_eq!(db.count_likes(&wrap_id).await.unwrap(), 1);
    assert_eq!(db.liked_wrap_ids(&user_id).await.unwrap(), vec![wrap_id.clone()]);

    db.remove_like(&wrap_id, &user_id).await.unwrap();
    assert_eq!(db.count_likes(&wrap_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_user_data() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_id("user");
    let other = unique_id("other");
    let wrap_id = unique_id("wrap");

    db.upsert_profile(&Profile::new(user_id.clone(), Utc::now()))
        .await
        .unwrap();
    db.set_credential(
        &user_id,
        &StoredCredential {
            access_token_encrypted: "a".to_string(),
            refresh_token_encrypted: "r".to_string(),
            expires_at: String::new(),
            scopes: vec![],
        },
    )
    .await
    .unwrap();
    db.insert_wrap(&test_wrap(&wrap_id, &user_id, Visibility::Public, 0))
        .await
        .unwrap();
    db.add_like(&WrapLike {
        wrap_id: wrap_id.clone(),
        user_id: other.clone(),
        created_at: Utc::now(),
    })
    .await
    .unwrap();
    db.add_follow(&Follow {
        follower_id: other.clone(),
        followee_id: user_id.clone(),
        created_at: Utc::now(),
    })
    .await
    .unwrap();

    let deleted = db.delete_user_data(&user_id).await.unwrap();
    // profile, credential, wrap, like, follow
    assert_eq!(deleted, 5);

    assert!(db.get_profile(&user_id).await.unwrap().is_none());
    assert!(db.get_credential(&user_id).await.unwrap().is_none());
    assert!(db.get_wrap(&wrap_id).await.unwrap().is_none());
    assert!(db.liked_wrap_ids(&other).await.unwrap().is_empty());
    assert!(db.following_ids(&other).await.unwrap().is_empty());
}
