// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Derived aggregates computed from Spotify listings.
//!
//! Everything here is pure: no I/O, and the output depends only on the
//! order and contents of the input.

use std::collections::{HashMap, HashSet};

use crate::models::{Album, Artist, GenreCount, Track};

/// Genre ranking length cached on the profile.
pub const PROFILE_GENRE_LIMIT: usize = 10;
/// Genre ranking length stored in a wrap.
pub const WRAP_GENRE_LIMIT: usize = 10;
/// Genre ranking length for summarized views.
pub const PREVIEW_GENRE_LIMIT: usize = 5;
/// Followed artists stored in a wrap.
pub const FOLLOWED_ARTIST_LIMIT: usize = 5;

/// Rank genres across `artists` by occurrence count, highest first.
///
/// Names are compared exactly (case-sensitive). Ties keep the order in
/// which each genre was first seen.
pub fn derive_genre_ranking(artists: &[Artist]) -> Vec<GenreCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut ranking: Vec<GenreCount> = Vec::new();

    for genre in artists.iter().flat_map(|a| a.genres.iter()) {
        match index.get(genre.as_str()) {
            Some(&i) => ranking[i].count += 1,
            None => {
                index.insert(genre.as_str(), ranking.len());
                ranking.push(GenreCount {
                    name: genre.clone(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable, so equal counts keep first-seen order.
    ranking.sort_by(|a, b| b.count.cmp(&a.count));
    ranking
}

/// [`derive_genre_ranking`] truncated to `limit` entries.
pub fn top_genres(artists: &[Artist], limit: usize) -> Vec<GenreCount> {
    let mut ranking = derive_genre_ranking(artists);
    ranking.truncate(limit);
    ranking
}

/// First element of an upstream-ranked list.
pub fn top_single<T: Clone>(items: &[T]) -> Option<T> {
    items.first().cloned()
}

/// Spotify has no "top albums" endpoint; the first saved album stands in.
pub fn approximated_top_album(saved_albums: &[Album]) -> Option<Album> {
    top_single(saved_albums)
}

pub fn top_followed(followed: &[Artist]) -> Vec<Artist> {
    followed.iter().take(FOLLOWED_ARTIST_LIMIT).cloned().collect()
}

/// Number of distinct genre names across all artists.
pub fn unique_genres_count(artists: &[Artist]) -> u32 {
    artists
        .iter()
        .flat_map(|a| a.genres.iter().map(String::as_str))
        .collect::<HashSet<_>>()
        .len() as u32
}

/// Number of distinct artists, by ID when present and by name otherwise.
pub fn unique_artists_count(artists: &[Artist]) -> u32 {
    artists
        .iter()
        .map(|a| if a.id.is_empty() { &a.name } else { &a.id })
        .collect::<HashSet<_>>()
        .len() as u32
}

/// Number of distinct tracks, by ID when present and by name otherwise.
pub fn unique_tracks_count(tracks: &[Track]) -> u32 {
    tracks
        .iter()
        .map(|t| t.id.as_deref().unwrap_or(&t.name))
        .collect::<HashSet<_>>()
        .len() as u32
}
