// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! At-rest encryption for OAuth tokens.
//!
//! AES-256-GCM with a key derived by HKDF-SHA256 from the configured secret.
//! The user ID is bound as associated data, so a ciphertext copied onto
//! another user's document fails to decrypt.
//!
//! Ciphertext format: `base64(nonce || ciphertext || tag)`.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

use crate::error::AppError;
use crate::models::{Credential, StoredCredential};
use crate::time_utils::{format_utc_rfc3339, parse_rfc3339_utc};

const KEY_SALT: &[u8] = b"spotify-unwrapped/token-encryption";
const KEY_INFO: &[u8] = b"credential-v1";

/// Token encryption service.
#[derive(Clone)]
pub struct TokenCipher {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
}

impl TokenCipher {
    /// Derive the encryption key from secret input keying material.
    pub fn new(secret: &[u8]) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Token encryption key is empty"
            )));
        }

        let hk = Hkdf::<Sha256>::new(Some(KEY_SALT), secret);
        let mut okm = [0u8; 32];
        hk.expand(KEY_INFO, &mut okm)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HKDF expand failed: {}", e)))?;

        let unbound = UnboundKey::new(&AES_256_GCM, &okm)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid AES-256-GCM key")))?;

        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt plaintext, binding `aad`. Returns base64-encoded ciphertext.
    pub fn encrypt(&self, plaintext: &str, aad: &[u8]) -> Result<String, AppError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Nonce generation failed")))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(aad),
                &mut in_out,
            )
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Token encryption failed")))?;

        let mut output = Vec::with_capacity(NONCE_LEN + in_out.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&in_out);
        Ok(BASE64.encode(output))
    }

    /// Decrypt base64-encoded ciphertext produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, ciphertext_b64: &str, aad: &[u8]) -> Result<String, AppError> {
        let bytes = BASE64.decode(ciphertext_b64).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Base64 ciphertext decode failed: {}", e))
        })?;

        if bytes.len() < NONCE_LEN {
            return Err(AppError::Internal(anyhow::anyhow!("Ciphertext too short")));
        }

        let (nonce_bytes, sealed) = bytes.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid nonce")))?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(aad), &mut in_out)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Token decryption failed")))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }

    /// Encrypt a credential for storage under `user_id`.
    pub fn seal_credential(
        &self,
        credential: &Credential,
        user_id: &str,
    ) -> Result<StoredCredential, AppError> {
        let aad = user_id.as_bytes();
        Ok(StoredCredential {
            access_token_encrypted: self.encrypt(&credential.access_token, aad)?,
            refresh_token_encrypted: self.encrypt(&credential.refresh_token, aad)?,
            expires_at: credential
                .expires_at
                .map(format_utc_rfc3339)
                .unwrap_or_default(),
            scopes: credential.scopes.clone(),
        })
    }

    /// Decrypt a stored credential. An unparseable expiry is treated as
    /// unknown, which forces a refresh on next use.
    pub fn open_credential(
        &self,
        stored: &StoredCredential,
        user_id: &str,
    ) -> Result<Credential, AppError> {
        let aad = user_id.as_bytes();
        let expires_at = parse_rfc3339_utc(&stored.expires_at);

        Ok(Credential {
            access_token: self.decrypt(&stored.access_token_encrypted, aad)?,
            refresh_token: self.decrypt(&stored.refresh_token_encrypted, aad)?,
            expires_at,
            scopes: stored.scopes.clone(),
        })
    }
}
