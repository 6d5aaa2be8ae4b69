// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify OAuth credential, in memory and at rest.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::spotify::TokenResponse;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Decrypted credential for one user's Spotify link.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// `None` when the stored expiry was missing or unparseable.
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

// Tokens stay out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl Credential {
    /// Build the first credential from an authorization-code grant.
    pub fn from_grant(response: TokenResponse, now: DateTime<Utc>) -> Result<Self, AppError> {
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Upstream {
                status: None,
                body: "Authorization response missing refresh_token".to_string(),
            })?;

        let expires_at =
            expiry_after(now, response.expires_in).ok_or_else(|| AppError::Upstream {
                status: None,
                body: format!("Invalid expires_in: {}", response.expires_in),
            })?;

        Ok(Self {
            access_token: response.access_token,
            refresh_token,
            expires_at: Some(expires_at),
            scopes: parse_scopes(response.scope.as_deref()),
        })
    }

    /// Apply a refresh-grant response. Spotify may or may not rotate the
    /// refresh token; the old one is kept when none is returned.
    pub fn rotated(&self, response: TokenResponse, now: DateTime<Utc>) -> Result<Self, AppError> {
        let expires_at = expiry_after(now, response.expires_in)
            .filter(|_| !response.access_token.is_empty())
            .ok_or_else(|| AppError::TokenRefreshFailed("Malformed token response".to_string()))?;

        let scopes = match response.scope.as_deref() {
            Some(scope) => parse_scopes(Some(scope)),
            None => self.scopes.clone(),
        };

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.refresh_token.clone()),
            expires_at: Some(expires_at),
            scopes,
        })
    }

    /// True when the access token is expired, about to expire, or has no
    /// known expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) >= expires_at,
            None => true,
        }
    }
}

fn parse_scopes(scope: Option<&str>) -> Vec<String> {
    scope
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// User's OAuth tokens (encrypted in Firestore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: String,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// Granted OAuth scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// `now + expires_in` seconds, or `None` for a non-positive or
/// unrepresentable lifetime.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    if expires_in <= 0 {
        return None;
    }
    now.checked_add_signed(Duration::try_seconds(expires_in)?)
}
