// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Password hashing, verification, and the password policy.

use crate::error::{AppError, Result};
use bcrypt::DEFAULT_COST;

/// Syntactically valid bcrypt hash that matches no password. Login verifies
/// against this when the user is unknown so response timing does not reveal
/// which emails exist.
pub const FAKE_PASSWORD_HASH: &str =
    "$2b$12$abcdefghijklmnopqrstuvABCDEFGHIJKLMNOPQRSTUVWXYZabcde";

/// Special characters accepted by the password policy.
const SPECIAL_CHARS: &str = "!@#$%^&*()-_+=";

/// Hash a password with bcrypt (cost 12).
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

/// Verify a password against a stored hash. Any malformed hash counts as a
/// mismatch rather than an error so callers keep a single failure path.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Enforce the registration password policy: 8+ chars with at least one
/// uppercase, lowercase, digit, and special character.
pub fn validate_password_policy(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AppError::WeakPassword(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| SPECIAL_CHARS.contains(c));

    if !has_upper {
        return Err(AppError::WeakPassword(
            "password must contain at least one uppercase letter".to_string(),
        ));
    }
    if !has_lower {
        return Err(AppError::WeakPassword(
            "password must contain at least one lowercase letter".to_string(),
        ));
    }
    if !has_digit {
        return Err(AppError::WeakPassword(
            "password must contain at least one number".to_string(),
        ));
    }
    if !has_special {
        return Err(AppError::WeakPassword(format!(
            "password must contain at least one special character ({SPECIAL_CHARS})"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("Abcd!234").unwrap();
        assert!(verify_password("Abcd!234", &hash));
        assert!(!verify_password("Abcd!235", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let h1 = hash_password("Abcd!234").unwrap();
        let h2 = hash_password("Abcd!234").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_fake_hash_never_matches() {
        assert!(!verify_password("", FAKE_PASSWORD_HASH));
        assert!(!verify_password("Abcd!234", FAKE_PASSWORD_HASH));
    }

    #[test]
    fn test_malformed_hash_is_mismatch() {
        assert!(!verify_password("Abcd!234", "not-a-bcrypt-hash"));
    }

    #[test]
    fn test_policy_boundary_length() {
        // 7 chars with all classes: rejected on length
        assert!(validate_password_policy("Abc!123").is_err());
        // 8 chars with all four classes: accepted
        assert!(validate_password_policy("Abcd!234").is_ok());
    }

    #[test]
    fn test_policy_requires_each_class() {
        assert!(validate_password_policy("abcd!234").is_err()); // no upper
        assert!(validate_password_policy("ABCD!234").is_err()); // no lower
        assert!(validate_password_policy("Abcd!efg").is_err()); // no digit
        assert!(validate_password_policy("Abcd1234").is_err()); // no special
    }
}
