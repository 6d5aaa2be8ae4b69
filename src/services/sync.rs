// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account linking and cached profile sync.

use std::sync::Arc;

use chrono::Utc;

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Credential, Profile, ProfileAggregates, TimeRange};
use crate::services::aggregate::{self, PROFILE_GENRE_LIMIT};
use crate::services::spotify::{Fetched, SpotifyClient, SpotifyUser};
use crate::services::tokens::{lock_for, TokenManager, UserLocks};

/// Listening window for the cached top items.
const PROFILE_TIME_RANGE: TimeRange = TimeRange::MediumTerm;
/// Top items cached on the profile.
const PROFILE_TOP_LIMIT: u32 = 20;
/// Recently played entries cached on the profile.
const RECENTLY_PLAYED_LIMIT: u32 = 50;
/// Page size when counting followed artists (only `total` is used).
const FOLLOWED_COUNT_LIMIT: u32 = 1;

/// Result of a profile refresh.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub profile: Profile,
    /// False when any aggregate fetch degraded and the previous aggregates
    /// were kept.
    pub aggregates_updated: bool,
}

/// Links Spotify accounts and keeps cached profiles current.
#[derive(Clone)]
pub struct ProfileSync {
    client: SpotifyClient,
    tokens: TokenManager,
    store: Arc<dyn Store>,
    write_locks: UserLocks,
}

impl ProfileSync {
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

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Exchange an authorization code, fetch identity, and store the
    /// profile and encrypted credential. Returns the linked profile.
    pub async fn link_account(&self, code: &str) -> Result<Profile, AppError> {
        let now = Utc::now();
        let grant = self.client.exchange_code(code).await?;
        let credential = Credential::from_grant(grant, now)?;

        let user = self.client.get_profile(&credential.access_token).await?;

        let lock = lock_for(&self.write_locks, &user.id);
        let _guard = lock.lock().await;

        let mut profile = self
            .store
            .get_profile(&user.id)
            .await?
            .unwrap_or_else(|| Profile::new(user.id.clone(), now));
        apply_identity(&mut profile, &user);
        profile.last_login = now;

        self.tokens.store_credential(&user.id, &credential).await?;
        self.store.upsert_profile(&profile).await?;

        tracing::info!(
            user_id = %user.id,
            "OAuth callback handled, profile and credential stored"
        );
        Ok(profile)
    }

    // ─── Sync ────────────────────────────────────────────────────────────────

    /// Refresh the cached profile from Spotify.
    ///
    /// Identity fields are always updated. Aggregates are replaced as one
    /// unit, and only when every aggregate fetch succeeded.
    pub async fn refresh_profile(&self, user_id: &str) -> Result<SyncOutcome, AppError> {
        let lock = lock_for(&self.write_locks, user_id);
        let _guard = lock.lock().await;

        let access_token = self.tokens.access_token(user_id).await?;
        let user = self.client.get_profile(&access_token).await?;

        let top_artists = self
            .client
            .top_artists(&access_token, PROFILE_TIME_RANGE, PROFILE_TOP_LIMIT)
            .await;
        let top_tracks = self
            .client
            .top_tracks(&access_token, PROFILE_TIME_RANGE, PROFILE_TOP_LIMIT)
            .await;
        let recently_played = self
            .client
            .recently_played(&access_token, RECENTLY_PLAYED_LIMIT)
            .await;
        let saved_tracks_count = self.client.saved_tracks_count(&access_token).await;
        let saved_albums_count = self.client.saved_albums_count(&access_token).await;
        let playlist_count = self.client.playlist_count(&access_token).await;
        let followed_count = self
            .client
            .followed_artists(&access_token, FOLLOWED_COUNT_LIMIT)
            .await
            .map(|page| page.total);

        let aggregates = collect_aggregates(
            top_artists.map(|p| p.items),
            top_tracks.map(|p| p.items),
            recently_played.map(|p| p.items),
            saved_tracks_count,
            saved_albums_count,
            playlist_count,
            followed_count,
        );

        let now = Utc::now();
        let mut profile = self
            .store
            .get_profile(user_id)
            .await?
            .unwrap_or_else(|| Profile::new(user_id.to_string(), now));
        apply_identity(&mut profile, &user);

        let aggregates_updated = match aggregates {
            Some(aggregates) => {
                profile.aggregates = aggregates;
                profile.last_synced_at = Some(now);
                true
            }
            None => {
                tracing::warn!(
                    user_id,
                    kind = "upstream_degraded",
                    "Aggregate fetch degraded, keeping previous aggregates"
                );
                false
            }
        };

        self.store.upsert_profile(&profile).await?;

        tracing::info!(user_id, aggregates_updated, "Profile synced");
        Ok(SyncOutcome {
            profile,
            aggregates_updated,
        })
    }
}

fn apply_identity(profile: &mut Profile, user: &SpotifyUser) {
    profile.display_name = user.display_name.clone();
    profile.email = user.email.clone();
    profile.country = user.country.clone();
    profile.tier = user.product.clone();
}

/// All-or-nothing: `None` if any input degraded.
fn collect_aggregates(
    top_artists: Fetched<Vec<crate::models::Artist>>,
    top_tracks: Fetched<Vec<crate::models::Track>>,
    recently_played: Fetched<Vec<crate::models::PlayHistoryItem>>,
    saved_tracks_count: Fetched<u32>,
    saved_albums_count: Fetched<u32>,
    playlist_count: Fetched<u32>,
    followed_artists_count: Fetched<u32>,
) -> Option<ProfileAggregates> {
    let top_artists = top_artists.fresh()?;
    Some(ProfileAggregates {
        top_genres: aggregate::top_genres(&top_artists, PROFILE_GENRE_LIMIT),
        top_artists,
        top_tracks: top_tracks.fresh()?,
        recently_played: recently_played.fresh()?,
        saved_tracks_count: saved_tracks_count.fresh()?,
        saved_albums_count: saved_albums_count.fresh()?,
        playlist_count: playlist_count.fresh()?,
        followed_artists_count: followed_artists_count.fresh()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Artist;

    fn fresh_inputs_with(playlist_count: Fetched<u32>) -> Option<ProfileAggregates> {
        collect_aggregates(
            Fetched::Fresh(vec![Artist {
                id: "a".to_string(),
                name: "A".to_string(),
                genres: vec!["rock".to_string()],
                ..Default::default()
            }]),
            Fetched::Fresh(vec![]),
            Fetched::Fresh(vec![]),
            Fetched::Fresh(10),
            Fetched::Fresh(3),
            playlist_count,
            Fetched::Fresh(7),
        )
    }

    #[test]
    fn test_all_fresh_produces_aggregates() {
        let aggregates = fresh_inputs_with(Fetched::Fresh(4)).unwrap();
        assert_eq!(aggregates.top_genres[0].name, "rock");
        assert_eq!(aggregates.saved_tracks_count, 10);
        assert_eq!(aggregates.playlist_count, 4);
        assert_eq!(aggregates.followed_artists_count, 7);
    }

    #[test]
    fn test_any_degraded_discards_all() {
        assert!(fresh_inputs_with(Fetched::Degraded("HTTP 500".to_string())).is_none());
    }
}
