// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! TOTP second factor: secret generation, code validation, backup codes,
//! and the short-lived pending-enrolment store bridging setup and enable.

use crate::cache::{keys, KvCache};
use crate::error::{AppError, Result};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

/// RFC 6238 defaults: 6 digits, 30-second step, SHA-1.
const DIGITS: usize = 6;
const STEP: u64 = 30;
/// Number of backup codes issued per enrolment.
const BACKUP_CODE_COUNT: usize = 10;
/// bcrypt cost for backup codes; they are high-entropy random strings.
const BACKUP_CODE_COST: u32 = 10;
/// How long a parked enrolment stays claimable.
const PENDING_TTL: Duration = Duration::from_secs(10 * 60);

/// Result of generating a new TOTP enrolment.
#[derive(Debug)]
pub struct MfaSetup {
    /// Base32 secret for manual entry
    pub secret: String,
    /// otpauth:// URL for QR provisioning
    pub url: String,
    /// Plaintext backup codes, shown exactly once
    pub backup_codes: Vec<String>,
}

/// Generate a fresh TOTP secret, provisioning URL, and backup codes.
pub fn generate_setup(account_name: &str, issuer: &str) -> Result<MfaSetup> {
    let mut secret_bytes = [0u8; 20];
    SystemRandom::new()
        .fill(&mut secret_bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("secret generation failed")))?;

    let totp = build_totp(secret_bytes.to_vec(), 1, Some(issuer), account_name)?;

    Ok(MfaSetup {
        secret: totp.get_secret_base32(),
        url: totp.get_url(),
        backup_codes: generate_backup_codes(BACKUP_CODE_COUNT)?,
    })
}

/// Validate a 6-digit code against a base32 secret, accepting the current
/// step and ±`skew` neighbours.
pub fn validate_code(secret_b32: &str, code: &str, skew: u8) -> bool {
    if code.len() != DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let Ok(secret_bytes) = Secret::Encoded(secret_b32.to_string()).to_bytes() else {
        return false;
    };
    let Ok(totp) = build_totp(secret_bytes, skew, None, "") else {
        return false;
    };
    totp.check_current(code).unwrap_or(false)
}

fn build_totp(
    secret_bytes: Vec<u8>,
    skew: u8,
    issuer: Option<&str>,
    account_name: &str,
) -> Result<TOTP> {
    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        skew,
        STEP,
        secret_bytes,
        issuer.map(|s| s.to_string()),
        account_name.to_string(),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("TOTP construction failed: {e}")))
}

/// Generate backup codes in `XXXX-XXXX` base32 format.
pub fn generate_backup_codes(count: usize) -> Result<Vec<String>> {
    let rng = SystemRandom::new();
    let mut codes = Vec::with_capacity(count);
    for _ in 0..count {
        let mut bytes = [0u8; 5];
        rng.fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("random generation failed")))?;
        let encoded = base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &bytes);
        codes.push(format!("{}-{}", &encoded[..4], &encoded[4..8]));
    }
    Ok(codes)
}

/// Hash a backup code for storage.
pub fn hash_backup_code(code: &str) -> Result<String> {
    bcrypt::hash(code, BACKUP_CODE_COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("backup code hashing failed: {e}")))
}

/// Match a candidate code against stored hashes. Returns the index of the
/// matching hash so the caller can mark it consumed.
pub fn match_backup_code(code: &str, hashes: &[String]) -> Option<usize> {
    hashes
        .iter()
        .position(|hash| bcrypt::verify(code, hash).unwrap_or(false))
}

// ---- Pending enrolments ----

/// Enrolment parked between `/auth/mfa/setup` and `/auth/mfa/enable`:
/// the secret the user is scanning and the hashes of the codes they saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMfa {
    pub secret: String,
    pub code_hashes: Vec<String>,
}

/// Ten-minute store for pending enrolments. Cache-backed when Redis is
/// present; the in-process fallback is single-instance only, like the OAuth
/// state fallback.
pub struct PendingEnrollments {
    cache: Option<KvCache>,
    fallback: DashMap<Uuid, (PendingMfa, Instant)>,
}

impl PendingEnrollments {
    pub fn new(cache: Option<KvCache>) -> Self {
        Self {
            cache,
            fallback: DashMap::new(),
        }
    }

    pub async fn store(&self, user_id: Uuid, pending: PendingMfa) -> Result<()> {
        if let Some(cache) = &self.cache {
            let json = serde_json::to_string(&pending)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize enrolment: {e}")))?;
            cache
                .set_ex(&enrolment_key(user_id), &json, PENDING_TTL.as_secs())
                .await?;
        } else {
            self.fallback
                .retain(|_, (_, stored)| stored.elapsed() < PENDING_TTL);
            self.fallback.insert(user_id, (pending, Instant::now()));
        }
        Ok(())
    }

    /// Claim the pending enrolment for a user, removing it.
    pub async fn take(&self, user_id: Uuid) -> Result<Option<PendingMfa>> {
        if let Some(cache) = &self.cache {
            let key = enrolment_key(user_id);
            let Some(json) = cache.get(&key).await? else {
                return Ok(None);
            };
            cache.del(&key).await?;
            let pending = serde_json::from_str(&json)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("deserialize enrolment: {e}")))?;
            Ok(Some(pending))
        } else {
            match self.fallback.remove(&user_id) {
                Some((_, (pending, stored))) if stored.elapsed() < PENDING_TTL => {
                    Ok(Some(pending))
                }
                _ => Ok(None),
            }
        }
    }
}

fn enrolment_key(user_id: Uuid) -> String {
    format!("{}{}", keys::MFA_SETUP, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn test_setup_shape() {
        let setup = generate_setup("o@x.io", "KyrosPraxis").unwrap();
        assert!(!setup.secret.is_empty());
        assert!(setup.url.starts_with("otpauth://totp/"));
        assert!(setup.url.contains("KyrosPraxis"));
        assert_eq!(setup.backup_codes.len(), 10);
        for code in &setup.backup_codes {
            assert_eq!(code.len(), 9);
            assert_eq!(&code[4..5], "-");
        }
    }

    #[test]
    fn test_current_code_validates() {
        let setup = generate_setup("o@x.io", "KyrosPraxis").unwrap();
        let secret_bytes = Secret::Encoded(setup.secret.clone()).to_bytes().unwrap();
        let totp = build_totp(secret_bytes, 1, None, "").unwrap();
        let code = totp.generate_current().unwrap();
        assert!(validate_code(&setup.secret, &code, 1));
    }

    #[test]
    fn test_previous_window_needs_skew() {
        let setup = generate_setup("o@x.io", "KyrosPraxis").unwrap();
        let secret_bytes = Secret::Encoded(setup.secret.clone()).to_bytes().unwrap();
        let totp = build_totp(secret_bytes, 0, None, "").unwrap();

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let previous = totp.generate(now - STEP);

        assert!(validate_code(&setup.secret, &previous, 1));
        // Guard against step-boundary flake: the previous-window code is only
        // guaranteed rejected at skew 0 while it differs from the current one.
        let current = totp.generate(now);
        if previous != current {
            assert!(!validate_code(&setup.secret, &previous, 0));
        }
    }

    #[test]
    fn test_malformed_codes_rejected() {
        let setup = generate_setup("o@x.io", "KyrosPraxis").unwrap();
        assert!(!validate_code(&setup.secret, "12345", 1));
        assert!(!validate_code(&setup.secret, "abcdef", 1));
        assert!(!validate_code(&setup.secret, "1234567", 1));
        assert!(!validate_code("not!base32", "123456", 1));
    }

    #[test]
    fn test_backup_code_match_and_miss() {
        let codes = generate_backup_codes(3).unwrap();
        let hashes: Vec<String> = codes.iter().map(|c| hash_backup_code(c).unwrap()).collect();

        assert_eq!(match_backup_code(&codes[1], &hashes), Some(1));
        assert_eq!(match_backup_code("AAAA-AAAA", &hashes), None);
    }

    #[tokio::test]
    async fn test_pending_enrolment_is_single_use() {
        let store = PendingEnrollments::new(None);
        let uid = Uuid::new_v4();
        store
            .store(
                uid,
                PendingMfa {
                    secret: "S".into(),
                    code_hashes: vec![],
                },
            )
            .await
            .unwrap();

        assert!(store.take(uid).await.unwrap().is_some());
        assert!(store.take(uid).await.unwrap().is_none());
    }
}
