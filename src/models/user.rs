//! User model and auth request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// User record stored in Postgres.
///
/// The password hash, MFA secret, and backup codes never leave the process;
/// API responses use [`UserResponse`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// bcrypt hash; empty for OAuth-only accounts
    pub password_hash: String,
    pub role: String,
    pub active: bool,
    pub mfa_enabled: bool,
    /// AEAD-encrypted TOTP secret when MFA is enabled
    pub mfa_secret: Option<String>,
    /// bcrypt hashes of unspent backup codes
    pub backup_codes: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public projection safe to return to clients.
    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            active: self.active,
            mfa_enabled: self.mfa_enabled,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// Public user information.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub mfa_enabled: bool,
    pub created_at: String,
}

// ---- Request types ----

/// Request body for user registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Request body for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Request body for token refresh (cookie takes precedence).
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Request body for enabling MFA after setup.
#[derive(Debug, Deserialize, Validate)]
pub struct MfaEnableRequest {
    #[validate(length(min = 16))]
    pub secret: String,
    #[validate(length(min = 6, max = 9))]
    pub code: String,
}

/// Request body for the MFA step of login.
#[derive(Debug, Deserialize, Validate)]
pub struct MfaVerifyRequest {
    pub user_id: Uuid,
    #[validate(length(min = 6, max = 9))]
    pub code: String,
}

/// Request body for disabling MFA.
#[derive(Debug, Deserialize, Validate)]
pub struct MfaDisableRequest {
    #[validate(length(min = 6, max = 9))]
    pub code: String,
}

// ---- Response types ----

/// Response for token-issuing endpoints.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Intermediate login response when the account has MFA enabled.
/// No cookie is set until `/auth/mfa/verify` succeeds.
#[derive(Debug, Serialize)]
pub struct MfaChallenge {
    pub mfa_required: bool,
    pub user_id: Uuid,
}
