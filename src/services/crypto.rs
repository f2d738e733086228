// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Sealing of stored OAuth tokens.
//!
//! Tokens are encrypted with AES-256-GCM before they reach the datastore and
//! decrypted on read. The wire format is `base64(nonce || ciphertext+tag)`.
//! Without a configured key the cipher is a passthrough (local development
//! and tests), so the rest of the code never branches on sealing.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// Seals and opens token strings for storage at rest.
#[derive(Clone)]
pub struct TokenCipher {
    key: Option<Arc<LessSafeKey>>,
    rng: SystemRandom,
}

impl TokenCipher {
    /// Create a cipher from a base64-encoded 32-byte key.
    pub fn new(key_b64: &str) -> Result<Self, AppError> {
        let key_bytes = BASE64
            .decode(key_b64)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid sealing key: {}", e)))?;
        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes).map_err(|_| {
            AppError::Internal(anyhow::anyhow!(
                "Sealing key must be {} bytes",
                AES_256_GCM.key_len()
            ))
        })?;
        Ok(Self {
            key: Some(Arc::new(LessSafeKey::new(unbound))),
            rng: SystemRandom::new(),
        })
    }

    /// Passthrough cipher: tokens are stored as-is.
    pub fn plaintext() -> Self {
        Self {
            key: None,
            rng: SystemRandom::new(),
        }
    }

    /// Build from optional config value.
    pub fn from_config(key_b64: Option<&str>) -> Result<Self, AppError> {
        match key_b64 {
            Some(key) => Self::new(key),
            None => {
                tracing::warn!("TOKEN_SEALING_KEY not set, storing tokens unsealed");
                Ok(Self::plaintext())
            }
        }
    }

    /// Seal a token for storage.
    pub fn seal(&self, plaintext: &str) -> Result<String, AppError> {
        let Some(key) = &self.key else {
            return Ok(plaintext.to_string());
        };

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("RNG failure")))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Token sealing failed")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&in_out);
        Ok(BASE64.encode(combined))
    }

    /// Open a sealed token read from storage.
    pub fn open(&self, sealed: &str) -> Result<String, AppError> {
        let Some(key) = &self.key else {
            return Ok(sealed.to_string());
        };

        let combined = BASE64
            .decode(sealed)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid sealed token: {}", e)))?;
        if combined.len() < NONCE_LEN {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Sealed token too short"
            )));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid nonce")))?;

        let mut in_out = ciphertext.to_vec();
        let opened = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Token unsealing failed")))?;

        String::from_utf8(opened.to_vec())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Sealed token not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key_b64() -> String {
        BASE64.encode([7u8; 32])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = TokenCipher::new(&test_key_b64()).unwrap();
        let sealed = cipher.seal("my-access-token").unwrap();
        assert_ne!(sealed, "my-access-token");
        assert_eq!(cipher.open(&sealed).unwrap(), "my-access-token");
    }

    #[test]
    fn test_sealing_is_randomized() {
        let cipher = TokenCipher::new(&test_key_b64()).unwrap();
        let a = cipher.seal("token").unwrap();
        let b = cipher.seal("token").unwrap();
        assert_ne!(a, b, "nonces must differ per seal");
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let cipher = TokenCipher::new(&test_key_b64()).unwrap();
        let sealed = cipher.seal("token").unwrap();
        let mut bytes = BASE64.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let tampered = BASE64.encode(bytes);
        assert!(cipher.open(&tampered).is_err());
    }

    #[test]
    fn test_plaintext_mode_passthrough() {
        let cipher = TokenCipher::plaintext();
        assert_eq!(cipher.seal("token").unwrap(), "token");
        assert_eq!(cipher.open("token").unwrap(), "token");
    }

    #[test]
    fn test_wrong_key_length_rejected() {
        let short = BASE64.encode([1u8; 16]);
        assert!(TokenCipher::new(&short).is_err());
    }
}
