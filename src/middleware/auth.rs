// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Bearer-token authentication middleware.
//!
//! `populate_auth` attaches the verified user to the request and never
//! rejects; `require_auth` is the inner gate that returns 401 when no
//! identity was attached.

use crate::services::tokens::TokenKind;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie carrying the access token for browser clients.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// Cookie carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
/// Header naming the caller's current session id.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// The authenticated user attached to the request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub crate::models::User);

/// Extract the bearer token from the Authorization header or cookie.
fn extract_token(request: &Request, jar: &CookieJar) -> Option<String> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if let Some(h) = auth_header {
        if let Some(token) = h.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string())
}

/// Attach the user to the request context when a valid, unrevoked access
/// token names an active account. Invalid tokens pass through anonymously;
/// endpoints that need identity use `require_auth`. A dead cookie that
/// produces a 401 is cleared on the way out so browsers don't get stuck.
pub async fn populate_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let via_cookie = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map_or(true, |h| !h.starts_with("Bearer "));
    let had_cookie = jar.get(ACCESS_TOKEN_COOKIE).is_some();

    let identity = match extract_token(&request, &jar) {
        Some(token) => resolve_identity(&state, &token).await,
        None => None,
    };
    let authenticated = identity.is_some();

    if authenticated {
        // Mark the caller's session active; best effort.
        if let Some(registry) = &state.sessions {
            if let Some(sid) = request
                .headers()
                .get(SESSION_ID_HEADER)
                .and_then(|h| h.to_str().ok())
            {
                if let Err(err) = registry.touch(sid).await {
                    tracing::debug!(error = %err, "session touch failed");
                }
            }
        }
    }

    if let Some(user) = identity {
        request.extensions_mut().insert(CurrentUser(user));
    }

    let mut response = next.run(request).await;

    if !authenticated
        && had_cookie
        && via_cookie
        && response.status() == axum::http::StatusCode::UNAUTHORIZED
    {
        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
            let cleared = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
            if let Ok(value) = axum::http::HeaderValue::from_str(&cleared) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
    }

    response
}

/// Verify the token, consult the denylist, and load the active user.
async fn resolve_identity(state: &Arc<AppState>, token: &str) -> Option<crate::models::User> {
    let claims = state.tokens.verify(token, TokenKind::Access).ok()?;

    if state.tokens.is_revoked(state.cache.as_ref(), &claims).await {
        return None;
    }

    match state.db.get_user_by_id(claims.user_id).await {
        Ok(Some(user)) if user.active => Some(user),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(error = %err, "user lookup failed during auth populate");
            None
        }
    }
}

/// Reject requests that reached a protected route without identity.
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<CurrentUser>().is_none() {
        return crate::error::AppError::Unauthorized.into_response();
    }
    next.run(request).await
}
