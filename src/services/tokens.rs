// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Bearer token minting and verification.
//!
//! Tokens are HS256 JWTs carrying the subject's id and email, an explicit
//! token kind, and a `jti` used for revocation. Only the HMAC family is
//! accepted on verification; `none` and asymmetric algorithms fail the
//! signature check by construction.

use crate::cache::{keys, KvCache};
use crate::error::{AppError, Result};
use crate::models::User;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Clock skew tolerated when validating `exp`.
const LEEWAY_SECS: u64 = 30;
/// Floor for denylist TTLs so an already-expired token still sticks briefly.
const MIN_DENYLIST_TTL_SECS: u64 = 300;

/// The two kinds of bearer token the gateway mints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id
    pub user_id: Uuid,
    /// Subject email
    pub sub: String,
    /// Token kind ("access" or "refresh")
    pub kind: String,
    /// Token id, denylisted on revocation
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Signs and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    production: bool,
}

impl TokenCodec {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64, production: bool) -> Self {
        Self {
            secret: secret.to_string(),
            access_ttl_secs,
            refresh_ttl_secs,
            production,
        }
    }

    /// Mint a token of the given kind for a user. Refuses to sign with an
    /// empty secret in production.
    pub fn mint(&self, kind: TokenKind, user: &User) -> Result<String> {
        if self.secret.is_empty() && self.production {
            return Err(AppError::Internal(anyhow::anyhow!(
                "refusing to mint tokens without a JWT secret in production"
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };

        let claims = Claims {
            user_id: user.id,
            sub: user.email.clone(),
            kind: kind.as_str().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token signing failed: {e}")))
    }

    /// Verify a token and assert its kind. Rejects bad signatures, other
    /// algorithms, expired tokens (with a small leeway), and kind mismatch.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|_| AppError::Unauthorized)?;

        // Reject tokens claiming to be issued in the future.
        let now = chrono::Utc::now().timestamp();
        if data.claims.iat > now + LEEWAY_SECS as i64 {
            return Err(AppError::Unauthorized);
        }

        if data.claims.kind != expected.as_str() {
            return Err(AppError::Unauthorized);
        }

        Ok(data.claims)
    }

    /// Whether the token id sits on the denylist. An absent cache means the
    /// denylist is empty.
    pub async fn is_revoked(&self, cache: Option<&KvCache>, claims: &Claims) -> bool {
        let Some(cache) = cache else {
            return false;
        };
        match cache.exists(&denylist_key(&claims.jti)).await {
            Ok(revoked) => revoked,
            Err(err) => {
                tracing::warn!(error = %err, "denylist lookup failed, treating token as live");
                false
            }
        }
    }

    /// Denylist a token until it would have expired anyway.
    pub async fn revoke(&self, cache: &KvCache, claims: &Claims) -> Result<()> {
        let remaining = claims.exp - chrono::Utc::now().timestamp();
        let ttl = (remaining.max(0) as u64).max(MIN_DENYLIST_TTL_SECS);
        cache.set_ex(&denylist_key(&claims.jti), "1", ttl).await?;
        Ok(())
    }
}

fn denylist_key(jti: &str) -> String {
    let digest = Sha256::digest(jti.as_bytes());
    format!("{}{}", keys::REVOKED_TOKEN, hex::encode(digest))
}
