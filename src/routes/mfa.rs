// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! TOTP second-factor routes: setup, enable, verify, disable.
//!
//! Setup parks the generated secret and hashed backup codes for ten
//! minutes; enable persists them only after the first valid code, so the
//! recovery codes on record are exactly the ones the user saw.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::middleware::{rate_limit, require_auth, CurrentUser};
use crate::models::user::{MfaDisableRequest, MfaEnableRequest, MfaVerifyRequest};
use crate::services::totp::{self, PendingMfa};
use crate::AppState;

use super::auth::{decode_and_validate, issue_tokens};

/// TOTP validation accepts the current step and one neighbour either side.
const TOTP_SKEW: u8 = 1;

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/mfa/setup", post(mfa_setup))
        .route("/mfa/enable", post(mfa_enable))
        .route("/mfa/disable", post(mfa_disable))
        .route_layer(axum::middleware::from_fn(require_auth));

    // Verify happens mid-login, before identity exists; it gets the
    // aggressive limiter instead.
    let verify = Router::new()
        .route("/mfa/verify", post(mfa_verify))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            rate_limit::mfa_rate_limit,
        ));

    protected.merge(verify)
}

/// POST /auth/mfa/setup: generate a fresh secret and backup codes. The
/// plaintext codes are returned exactly once.
async fn mfa_setup(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response> {
    let setup = totp::generate_setup(&user.email, &state.config.mfa_issuer)?;

    let code_hashes = setup
        .backup_codes
        .iter()
        .map(|code| totp::hash_backup_code(code))
        .collect::<Result<Vec<_>>>()?;

    state
        .enrollments
        .store(
            user.id,
            PendingMfa {
                secret: setup.secret.clone(),
                code_hashes,
            },
        )
        .await?;

    Ok(Json(serde_json::json!({
        "secret": setup.secret,
        "url": setup.url,
        "backup_codes": setup.backup_codes,
    }))
    .into_response())
}

/// POST /auth/mfa/enable: verify the first code against the pending
/// enrolment and persist the encrypted secret plus hashed backup codes.
async fn mfa_enable(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: std::result::Result<Json<MfaEnableRequest>, JsonRejection>,
) -> Result<Response> {
    let req = decode_and_validate(body)?;

    let Some(pending) = state.enrollments.take(user.id).await? else {
        return Err(AppError::Validation(
            "no pending MFA setup; call /auth/mfa/setup first".to_string(),
        ));
    };

    let secret_matches: bool = pending
        .secret
        .as_bytes()
        .ct_eq(req.secret.as_bytes())
        .into();
    if !secret_matches {
        state.enrollments.store(user.id, pending).await?;
        return Err(AppError::Validation(
            "secret does not match the pending MFA setup".to_string(),
        ));
    }

    if !totp::validate_code(&pending.secret, &req.code, TOTP_SKEW) {
        state.enrollments.store(user.id, pending).await?;
        return Err(AppError::InvalidCode);
    }

    let encrypted_secret = state.encryptor.encrypt(&pending.secret)?;
    state
        .db
        .update_user_mfa(
            user.id,
            true,
            Some(&encrypted_secret),
            Some(&pending.code_hashes),
        )
        .await?;

    tracing::info!(user_id = %user.id, "MFA enabled");
    Ok(Json(serde_json::json!({
        "enabled": true,
        "message": "MFA enabled successfully",
    }))
    .into_response())
}

/// POST /auth/mfa/verify: the second factor of login. Accepts a TOTP code
/// or a one-shot backup code, then issues tokens and cookies.
async fn mfa_verify(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    body: std::result::Result<Json<MfaVerifyRequest>, JsonRejection>,
) -> Result<Response> {
    let req = decode_and_validate(body)?;

    let user = state
        .db
        .get_user_by_id(req.user_id)
        .await?
        .filter(|u| u.active && u.mfa_enabled)
        .ok_or(AppError::InvalidCode)?;

    let secret = user
        .mfa_secret
        .as_deref()
        .ok_or(AppError::InvalidCode)
        .and_then(|stored| state.encryptor.decrypt(stored))?;

    if totp::validate_code(&secret, &req.code, TOTP_SKEW) {
        return issue_tokens(&state, &user, jar, &headers).await;
    }

    // Fall back to backup codes; a match is consumed permanently.
    let hashes = user.backup_codes.clone().unwrap_or_default();
    let Some(index) = totp::match_backup_code(&req.code, &hashes) else {
        return Err(AppError::InvalidCode);
    };

    let mut remaining = hashes;
    remaining.remove(index);
    state
        .db
        .update_user_mfa(
            user.id,
            true,
            user.mfa_secret.as_deref(),
            Some(&remaining),
        )
        .await?;

    tracing::info!(user_id = %user.id, remaining = remaining.len(), "backup code consumed");
    issue_tokens(&state, &user, jar, &headers).await
}

/// POST /auth/mfa/disable: requires a valid current TOTP code, then clears
/// the secret and backup codes.
async fn mfa_disable(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: std::result::Result<Json<MfaDisableRequest>, JsonRejection>,
) -> Result<Response> {
    let req = decode_and_validate(body)?;

    if !user.mfa_enabled {
        return Err(AppError::Validation("MFA is not enabled".to_string()));
    }

    let secret = user
        .mfa_secret
        .as_deref()
        .ok_or(AppError::InvalidCode)
        .and_then(|stored| state.encryptor.decrypt(stored))?;

    if !totp::validate_code(&secret, &req.code, TOTP_SKEW) {
        return Err(AppError::InvalidCode);
    }

    state.db.update_user_mfa(user.id, false, None, None).await?;

    tracing::info!(user_id = %user.id, "MFA disabled");
    Ok(Json(serde_json::json!({
        "disabled": true,
        "message": "MFA disabled successfully",
    }))
    .into_response())
}
