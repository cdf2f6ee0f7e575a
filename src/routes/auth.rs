// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Core authentication routes: register, login, logout, refresh, me, and
//! WebSocket admission tickets.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::cache::keys;
use crate::error::{AppError, Result};
use crate::middleware::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::middleware::{require_auth, CurrentUser};
use crate::models::user::{
    LoginRequest, MfaChallenge, RefreshRequest, RegisterRequest, TokenResponse,
};
use crate::models::User;
use crate::services::crypto::generate_state;
use crate::services::password::{
    hash_password, validate_password_policy, verify_password, FAKE_PASSWORD_HASH,
};
use crate::services::tokens::TokenKind;
use crate::AppState;

/// WS admission tickets live for five minutes.
const WS_TICKET_TTL_SECS: u64 = 5 * 60;
const WS_TICKET_BYTES: usize = 32;

pub fn routes() -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/me", get(me))
        .route("/ws-token", post(ws_token))
        .route_layer(axum::middleware::from_fn(require_auth));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .merge(protected)
}

/// Unwrap a JSON body, mapping both decode and rule failures to
/// `validation_error`.
pub(crate) fn decode_and_validate<T: Validate>(
    body: std::result::Result<Json<T>, JsonRejection>,
) -> Result<T> {
    let Json(value) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    value
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(value)
}

/// POST /auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response> {
    let req = decode_and_validate(body)?;

    if state.db.get_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::EmailExists);
    }
    if state
        .db
        .get_user_by_username(&req.username)
        .await?
        .is_some()
    {
        return Err(AppError::UsernameExists);
    }

    validate_password_policy(&req.password)?;
    let password_hash = hash_password(&req.password)?;

    let user = User {
        id: Uuid::new_v4(),
        username: req.username,
        email: req.email,
        password_hash,
        role: "user".to_string(),
        active: true,
        mfa_enabled: false,
        mfa_secret: None,
        backup_codes: None,
        created_at: Utc::now(),
    };
    state.db.create_user(&user).await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user.to_response())).into_response())
}

/// POST /auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response> {
    let req = decode_and_validate(body)?;

    let user = state.db.get_user_by_email(&req.email).await?;

    // Verify against a fake hash when the user is unknown so response
    // timing does not reveal which emails exist.
    let password_hash = user
        .as_ref()
        .map(|u| u.password_hash.as_str())
        .filter(|h| !h.is_empty())
        .unwrap_or(FAKE_PASSWORD_HASH);
    let password_ok = verify_password(&req.password, password_hash);

    let user = match user {
        Some(user) if password_ok && user.active => user,
        _ => return Err(AppError::InvalidCredentials),
    };

    // MFA-enabled accounts get an intermediate challenge; no cookie is set
    // until the second factor verifies.
    if user.mfa_enabled {
        return Ok(Json(MfaChallenge {
            mfa_required: true,
            user_id: user.id,
        })
        .into_response());
    }

    issue_tokens(&state, &user, jar, &headers).await
}

/// Mint access + refresh tokens, create a session when the registry is
/// available, and set auth cookies. Shared by login, OAuth callback, and
/// MFA verification.
pub(crate) async fn issue_tokens(
    state: &Arc<AppState>,
    user: &User,
    jar: CookieJar,
    headers: &HeaderMap,
) -> Result<Response> {
    let access_token = state.tokens.mint(TokenKind::Access, user)?;
    let refresh_token = state.tokens.mint(TokenKind::Refresh, user)?;

    let session_id = establish_session(state, user, headers).await;

    let jar = jar
        .add(auth_cookie(
            state,
            ACCESS_TOKEN_COOKIE,
            access_token.clone(),
            state.config.access_token_seconds(),
        ))
        .add(auth_cookie(
            state,
            REFRESH_TOKEN_COOKIE,
            refresh_token.clone(),
            state.config.refresh_token_seconds(),
        ));

    let body = TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        refresh_token: Some(refresh_token),
        expires_in: state.config.access_token_seconds(),
        session_id,
    };

    Ok((jar, Json(body)).into_response())
}

/// POST /auth/logout: clears cookies and best-effort denylists the
/// presented access token. Idempotent.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Response> {
    let token = bearer_or_cookie(&headers, &jar);
    if let (Some(token), Some(cache)) = (token, &state.cache) {
        if let Ok(claims) = state.tokens.verify(&token, TokenKind::Access) {
            if let Err(err) = state.tokens.revoke(cache, &claims).await {
                tracing::warn!(error = %err, "token denylist write failed during logout");
            }
        }
    }

    let jar = jar
        .add(expired_cookie(&state, ACCESS_TOKEN_COOKIE))
        .add(expired_cookie(&state, REFRESH_TOKEN_COOKIE));

    Ok((jar, Json(serde_json::json!({ "logged_out": true }))).into_response())
}

/// POST /auth/refresh: exchange a refresh token for a new access token.
async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<Response> {
    let token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|Json(req)| req.refresh_token))
        .ok_or(AppError::Unauthorized)?;

    let claims = state.tokens.verify(&token, TokenKind::Refresh)?;
    if state.tokens.is_revoked(state.cache.as_ref(), &claims).await {
        return Err(AppError::Unauthorized);
    }

    let user = state
        .db
        .get_user_by_id(claims.user_id)
        .await?
        .filter(|u| u.active)
        .ok_or(AppError::Unauthorized)?;

    let access_token = state.tokens.mint(TokenKind::Access, &user)?;
    let jar = jar.add(auth_cookie(
        &state,
        ACCESS_TOKEN_COOKIE,
        access_token.clone(),
        state.config.access_token_seconds(),
    ));

    let body = TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        refresh_token: None,
        expires_in: state.config.access_token_seconds(),
        session_id: None,
    };

    Ok((jar, Json(body)).into_response())
}

/// GET /auth/me
async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Response {
    Json(user.to_response()).into_response()
}

/// POST /auth/ws-token: mint a short-lived admission ticket for WebSocket
/// handshakes, where cookies cannot be sent.
async fn ws_token(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response> {
    let Some(cache) = &state.cache else {
        return Err(AppError::Unavailable(
            "WebSocket tickets require Redis".to_string(),
        ));
    };

    let ticket = generate_state(WS_TICKET_BYTES)?;
    cache
        .set_ex(
            &format!("{}{}", keys::WS_TICKET, ticket),
            &user.id.to_string(),
            WS_TICKET_TTL_SECS,
        )
        .await?;

    Ok(Json(serde_json::json!({ "ws_token": ticket })).into_response())
}

// ---- Helpers ----

fn bearer_or_cookie(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
        .or_else(|| jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string()))
}

/// httpOnly auth cookie with environment-appropriate flags.
pub(crate) fn auth_cookie(
    state: &Arc<AppState>,
    name: &'static str,
    value: String,
    max_age_secs: i64,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(state.config.is_production());
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(time::Duration::seconds(max_age_secs));
    cookie
}

/// Cookie removal must match the attributes used when it was set.
fn expired_cookie(state: &Arc<AppState>, name: &'static str) -> Cookie<'static> {
    let mut cookie = auth_cookie(state, name, String::new(), 0);
    cookie.set_max_age(time::Duration::seconds(0));
    cookie
}

/// Create a server-side session when the registry is available.
pub(crate) async fn establish_session(
    state: &Arc<AppState>,
    user: &User,
    headers: &HeaderMap,
) -> Option<String> {
    let registry = state.sessions.as_ref()?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown");
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown");
    let device_info = device_from_user_agent(user_agent);

    match registry
        .create(user.id, &device_info, ip_address, user_agent)
        .await
    {
        Ok(session) => Some(session.id),
        Err(err) => {
            tracing::warn!(error = %err, user_id = %user.id, "session creation failed");
            None
        }
    }
}

/// Coarse device descriptor from the User-Agent product token.
fn device_from_user_agent(user_agent: &str) -> String {
    let product = user_agent.split_whitespace().next().unwrap_or("unknown");
    if user_agent.contains("Mobile") {
        format!("{product} (mobile)")
    } else {
        product.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_from_user_agent() {
        assert_eq!(device_from_user_agent("curl/8.4.0"), "curl/8.4.0");
        assert_eq!(
            device_from_user_agent("Mozilla/5.0 (iPhone) Mobile Safari"),
            "Mozilla/5.0 (mobile)"
        );
        assert_eq!(device_from_user_agent(""), "unknown");
    }
}
