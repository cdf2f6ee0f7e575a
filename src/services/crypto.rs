// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! At-rest encryption for OAuth tokens and MFA secrets, plus random token
//! generation.
//!
//! Ciphertexts are AES-256-GCM with a random 96-bit nonce prepended, base64
//! encoded, and tagged with a literal `enc:` prefix so plaintext values laid
//! down before a key was configured keep decrypting.

use crate::error::{AppError, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD};
use base64::Engine as _;
use ring::rand::{SecureRandom, SystemRandom};

/// Marker distinguishing encrypted values from legacy plaintext.
const ENC_PREFIX: &str = "enc:";
/// AES-GCM nonce size in bytes.
const NONCE_LEN: usize = 12;

/// Encrypts and decrypts sensitive values at rest.
///
/// Built without a key, both operations are identity functions, except that
/// decrypting an `enc:`-prefixed value then fails, because the data is
/// unrecoverable.
#[derive(Clone)]
pub struct TokenEncryptor {
    cipher: Option<Aes256Gcm>,
    rng: SystemRandom,
}

impl TokenEncryptor {
    /// Create an encryptor from a 32-byte key, or a disabled one from an
    /// empty key.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Ok(Self {
                cipher: None,
                rng: SystemRandom::new(),
            });
        }
        if key.len() != 32 {
            return Err(AppError::Internal(anyhow::anyhow!(
                "encryption key must be exactly 32 bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        Ok(Self {
            cipher: Some(cipher),
            rng: SystemRandom::new(),
        })
    }

    /// True when a key is configured.
    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Encrypt a value for storage. Returns the plaintext unchanged when
    /// encryption is disabled.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let Some(cipher) = &self.cipher else {
            return Ok(plaintext.to_string());
        };
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("nonce generation failed")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| AppError::Internal(anyhow::anyhow!("encryption failed")))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(format!("{ENC_PREFIX}{}", BASE64.encode(combined)))
    }

    /// Decrypt a stored value. Values without the `enc:` prefix are returned
    /// as-is; prefixed values require the key they were written with.
    pub fn decrypt(&self, stored: &str) -> Result<String> {
        let Some(encoded) = stored.strip_prefix(ENC_PREFIX) else {
            return Ok(stored.to_string());
        };

        let Some(cipher) = &self.cipher else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "value is encrypted but no encryption key is configured"
            )));
        };

        let combined = BASE64
            .decode(encoded)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("ciphertext decode failed: {e}")))?;
        if combined.len() < NONCE_LEN {
            return Err(AppError::Internal(anyhow::anyhow!("ciphertext too short")));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("decryption failed")))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("plaintext not UTF-8: {e}")))
    }
}

/// Generate `n_bytes` of OS randomness, base64url encoded without padding.
/// Used for OAuth state, session ids, CSRF tokens, and WS tickets.
pub fn generate_state(n_bytes: usize) -> Result<String> {
    let mut bytes = vec![0u8; n_bytes];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("random generation failed")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> TokenEncryptor {
        TokenEncryptor::new(b"0123456789abcdef0123456789abcdef").unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let enc = keyed();
        let ct = enc.encrypt("gho_secret_token").unwrap();
        assert!(ct.starts_with("enc:"));
        assert_eq!(enc.decrypt(&ct).unwrap(), "gho_secret_token");
    }

    #[test]
    fn test_ciphertexts_are_nondeterministic() {
        let enc = keyed();
        let a = enc.encrypt("same plaintext").unwrap();
        let b = enc.encrypt("same plaintext").unwrap();
        assert_ne!(a, b);
        assert_eq!(enc.decrypt(&a).unwrap(), enc.decrypt(&b).unwrap());
    }

    #[test]
    fn test_disabled_is_identity() {
        let enc = TokenEncryptor::new(b"").unwrap();
        assert!(!enc.is_enabled());
        assert_eq!(enc.encrypt("plain").unwrap(), "plain");
        assert_eq!(enc.decrypt("plain").unwrap(), "plain");
    }

    #[test]
    fn test_decrypt_encrypted_without_key_fails() {
        let ct = keyed().encrypt("secret").unwrap();
        let disabled = TokenEncryptor::new(b"").unwrap();
        assert!(disabled.decrypt(&ct).is_err());
    }

    #[test]
    fn test_legacy_plaintext_passes_through_keyed() {
        let enc = keyed();
        assert_eq!(enc.decrypt("legacy-plaintext").unwrap(), "legacy-plaintext");
    }

    #[test]
    fn test_wrong_key_fails() {
        let ct = keyed().encrypt("secret").unwrap();
        let other = TokenEncryptor::new(b"ffffffffffffffffffffffffffffffff").unwrap();
        assert!(other.decrypt(&ct).is_err());
    }

    #[test]
    fn test_bad_key_length_rejected() {
        assert!(TokenEncryptor::new(b"short").is_err());
    }

    #[test]
    fn test_generate_state_length_and_uniqueness() {
        let a = generate_state(32).unwrap();
        let b = generate_state(32).unwrap();
        assert_ne!(a, b);
        // 32 bytes -> 43 base64url chars without padding
        assert_eq!(a.len(), 43);
    }
}
