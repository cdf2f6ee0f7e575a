// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! MFA enrolment flow at the service level: the pending-enrolment bridge
//! between setup and enable, secret encryption at rest, and one-shot
//! backup codes.

use kyros_gateway::services::totp::{self, PendingMfa, PendingEnrollments};
use kyros_gateway::services::TokenEncryptor;
use std::time::{SystemTime, UNIX_EPOCH};
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

fn totp_for(secret_b32: &str) -> TOTP {
    let secret = Secret::Encoded(secret_b32.to_string()).to_bytes().unwrap();
    TOTP::new(Algorithm::SHA1, 6, 1, 30, secret, None, String::new()).unwrap()
}

/// Compute the code a user's authenticator would show right now.
fn current_code(secret_b32: &str) -> String {
    totp_for(secret_b32).generate_current().unwrap()
}

#[tokio::test]
async fn test_setup_then_enable_flow() {
    let enrollments = PendingEnrollments::new(None);
    let user_id = Uuid::new_v4();

    // Setup: generate and park secret + hashed codes.
    let setup = totp::generate_setup("o@x.io", "KyrosPraxis").unwrap();
    let code_hashes: Vec<String> = setup
        .backup_codes
        .iter()
        .map(|c| totp::hash_backup_code(c).unwrap())
        .collect();
    enrollments
        .store(
            user_id,
            PendingMfa {
                secret: setup.secret.clone(),
                code_hashes: code_hashes.clone(),
            },
        )
        .await
        .unwrap();

    // Enable: claim the pending enrolment and verify the first code.
    let pending = enrollments.take(user_id).await.unwrap().unwrap();
    assert_eq!(pending.secret, setup.secret);
    assert_eq!(pending.code_hashes.len(), 10);
    assert!(totp::validate_code(
        &pending.secret,
        &current_code(&pending.secret),
        1
    ));

    // The enrolment is gone once claimed.
    assert!(enrollments.take(user_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_secret_encrypted_at_rest_roundtrip() {
    let encryptor = TokenEncryptor::new(b"0123456789abcdef0123456789abcdef").unwrap();
    let setup = totp::generate_setup("o@x.io", "KyrosPraxis").unwrap();

    let stored = encryptor.encrypt(&setup.secret).unwrap();
    assert!(stored.starts_with("enc:"));
    assert_ne!(stored, setup.secret);

    // Codes generated against the decrypted secret still validate.
    let recovered = encryptor.decrypt(&stored).unwrap();
    assert_eq!(recovered, setup.secret);
    assert!(totp::validate_code(&recovered, &current_code(&recovered), 1));
}

#[test]
fn test_backup_code_single_use() {
    let codes = totp::generate_backup_codes(10).unwrap();
    let mut hashes: Vec<String> = codes
        .iter()
        .map(|c| totp::hash_backup_code(c).unwrap())
        .collect();

    // First use matches and is consumed by removing its hash.
    let index = totp::match_backup_code(&codes[3], &hashes).expect("code accepted");
    hashes.remove(index);

    // Second use of the same code finds nothing.
    assert!(totp::match_backup_code(&codes[3], &hashes).is_none());
    // Other codes are unaffected.
    assert!(totp::match_backup_code(&codes[4], &hashes).is_some());
}

#[test]
fn test_wrong_secret_rejects_code() {
    let a = totp::generate_setup("o@x.io", "KyrosPraxis").unwrap();
    let b = totp::generate_setup("o@x.io", "KyrosPraxis").unwrap();

    // A code for secret A must not validate against secret B. Guard
    // against the one-in-a-million collision with any of B's accepted
    // windows before asserting.
    let code = current_code(&a.secret);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let b_totp = totp_for(&b.secret);
    let collides = [now - 30, now, now + 30]
        .iter()
        .any(|t| b_totp.generate(*t) == code);

    if !collides {
        assert!(!totp::validate_code(&b.secret, &code, 1));
    }
}
