// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify API client.
//!
//! Handles:
//! - Authorization code exchange and token refresh
//! - Profile fetch (required, fails hard)
//! - Top items, recently played, library and follow listings (best effort)
//!
//! List endpoints never fail the caller: any non-success status, transport
//! error or undecodable body becomes [`Fetched::Degraded`]. Only one page is
//! requested; `limit` and `time_range` are passed through as given.

use std::time::Duration;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Album, Artist, PlayHistoryItem, TimeRange, Track};

/// Scopes requested at authorization time.
pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-top-read",
    "user-read-recently-played",
    "user-library-read",
    "playlist-read-private",
    "user-follow-read",
];

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Outcome of a best-effort list fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Fresh(T),
    /// The upstream call failed; carries a short reason for logging.
    Degraded(String),
}

impl<T> Fetched<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Fetched::Degraded(_))
    }

    pub fn fresh(self) -> Option<T> {
        match self {
            Fetched::Fresh(value) => Some(value),
            Fetched::Degraded(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Fresh(value) => Fetched::Fresh(f(value)),
            Fetched::Degraded(reason) => Fetched::Degraded(reason),
        }
    }
}

impl<T: Default> Fetched<T> {
    /// The fetched value, or the empty shape when degraded.
    pub fn unwrap_or_default(self) -> T {
        self.fresh().unwrap_or_default()
    }
}

/// Spotify API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    accounts_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl SpotifyClient {
    /// Create a new Spotify client with OAuth credentials from config.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            accounts_url: config.spotify_accounts_url.trim_end_matches('/').to_string(),
            api_url: config.spotify_api_url.trim_end_matches('/').to_string(),
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
            redirect_uri: config.spotify_redirect_uri.clone(),
        })
    }

    /// Build the provider authorize URL for a signed `state`.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.accounts_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            urlencoding::encode(state)
        )
    }

    // ─── Token Endpoint ──────────────────────────────────────────────────────

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await
            .map_err(|e| AppError::Upstream {
                status: None,
                body: format!("Token exchange failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Spotify token exchange failed");
            return Err(AppError::Upstream {
                status: Some(status.as_u16()),
                body,
            });
        }

        response.json().await.map_err(|e| AppError::Upstream {
            status: None,
            body: format!("Failed to parse token response: {}", e),
        })
    }

    /// Refresh an expired access token. Exactly one request is made.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await
            .map_err(|e| {
                AppError::TokenRefreshFailed(format!("Token refresh request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::TokenRefreshFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::TokenRefreshFailed(format!("Malformed token response: {}", e)))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(format!("{}/api/token", self.accounts_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
    }

    // ─── Web API ─────────────────────────────────────────────────────────────

    /// Get the authenticated user's profile. Identity is required, so any
    /// failure is returned as an error.
    pub async fn get_profile(&self, access_token: &str) -> Result<SpotifyUser, AppError> {
        let url = format!("{}/me", self.api_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream {
                status: None,
                body: e.to_string(),
            })?;

        self.check_response_json(response).await
    }

    /// Get the user's top artists.
    pub async fn top_artists(
        &self,
        access_token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Fetched<Paging<Artist>> {
        self.get_list(
            "me/top/artists",
            access_token,
            &[
                ("time_range", time_range.as_str().to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Get the user's top tracks.
    pub async fn top_tracks(
        &self,
        access_token: &str,
        time_range: TimeRange,
        limit: u32,
    ) -> Fetched<Paging<Track>> {
        self.get_list(
            "me/top/tracks",
            access_token,
            &[
                ("time_range", time_range.as_str().to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Get recently played tracks (most recent first).
    pub async fn recently_played(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Fetched<Paging<PlayHistoryItem>> {
        self.get_list(
            "me/player/recently-played",
            access_token,
            &[("limit", limit.to_string())],
        )
        .await
    }

    /// Get the user's saved albums, in library order.
    pub async fn saved_albums(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Fetched<Paging<SavedAlbum>> {
        self.get_list("me/albums", access_token, &[("limit", limit.to_string())])
            .await
    }

    /// Total number of saved tracks.
    pub async fn saved_tracks_count(&self, access_token: &str) -> Fetched<u32> {
        self.get_list::<Paging<IgnoredAny>>(
            "me/tracks",
            access_token,
            &[("limit", "1".to_string())],
        )
        .await
        .map(|page| page.total)
    }

    /// Total number of saved albums.
    pub async fn saved_albums_count(&self, access_token: &str) -> Fetched<u32> {
        self.saved_albums(access_token, 1).await.map(|page| page.total)
    }

    /// Total number of playlists owned or followed.
    pub async fn playlist_count(&self, access_token: &str) -> Fetched<u32> {
        self.get_list::<Paging<IgnoredAny>>(
            "me/playlists",
            access_token,
            &[("limit", "1".to_string())],
        )
        .await
        .map(|page| page.total)
    }

    /// Get followed artists. `total` is the full follow count even though
    /// only one page of items is returned.
    pub async fn followed_artists(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Fetched<Paging<Artist>> {
        self.get_list::<FollowedArtists>(
            "me/following",
            access_token,
            &[("type", "artist".to_string()), ("limit", limit.to_string())],
        )
        .await
        .map(|followed| followed.artists)
    }

    /// Best-effort GET: failures are logged and reported as degraded.
    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Fetched<T> {
        let url = format!("{}/{}", self.api_url, path);

        let result = match self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
        {
            Ok(response) => self.check_response_json(response).await,
            Err(e) => Err(AppError::Upstream {
                status: None,
                body: e.to_string(),
            }),
        };

        match result {
            Ok(value) => Fetched::Fresh(value),
            Err(e) => {
                tracing::warn!(
                    kind = "upstream_degraded",
                    endpoint = path,
                    error = %e,
                    "Spotify list fetch failed, substituting empty result"
                );
                Fetched::Degraded(e.to_string())
            }
        }
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Spotify rate limit hit (429)");
            }

            return Err(AppError::Upstream {
                status: Some(status.as_u16()),
                body,
            });
        }

        response.json().await.map_err(|e| AppError::Upstream {
            status: Some(status.as_u16()),
            body: format!("JSON parse error: {}", e),
        })
    }
}

/// Token endpoint response (both grant types).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Absent on refresh unless Spotify rotated it.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// `GET /me` response.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
}

/// One page of a Spotify listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
}

impl<T> Default for Paging<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Saved-library album entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedAlbum {
    #[serde(default)]
    pub added_at: Option<String>,
    pub album: Album,
}

/// `GET /me/following` wraps its cursor page in an `artists` key.
#[derive(Debug, Deserialize)]
struct FollowedArtists {
    artists: Paging<Artist>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_tolerates_missing_fields() {
        let page: Paging<Track> = serde_json::from_str(r#"{"total": 3}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_track_decodes_sparse_payload() {
        let json = r#"{"items": [{"id": "t1", "name": "Song", "preview_url": null}]}"#;
        let page: Paging<Track> = serde_json::from_str(json).unwrap();
        assert_eq!(page.items[0].name, "Song");
        assert!(page.items[0].artists.is_empty());
        assert!(page.items[0].preview_url.is_none());
    }

    #[test]
    fn test_fetched_degraded_defaults_to_empty() {
        let fetched: Fetched<Paging<Artist>> = Fetched::Degraded("HTTP 500".to_string());
        assert!(fetched.is_degraded());
        assert!(fetched.unwrap_or_default().items.is_empty());
    }

    #[test]
    fn test_authorize_url_contains_flow_parameters() {
        let client = SpotifyClient::new(&Config::test_default()).unwrap();
        let url = client.authorize_url("abc-123");

        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fspotify%2Fcallback"
        ));
        assert!(url.contains("user-top-read"));
        assert!(url.contains("state=abc-123"));
    }
}
