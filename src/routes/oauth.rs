// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! OAuth 2.0 authorization-code routes.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::models::User;
use crate::services::crypto::generate_state;
use crate::services::oauth::OAuthProfile;
use crate::services::tokens::TokenKind;
use crate::AppState;

/// Entropy for the state parameter: 32 bytes, ≥256 bits.
const STATE_BYTES: usize = 32;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/oauth/providers", get(list_providers))
        .route("/oauth/:provider", get(oauth_start))
        .route("/oauth/:provider/callback", get(oauth_callback))
}

/// GET /auth/oauth/providers
async fn list_providers(State(state): State<Arc<AppState>>) -> Response {
    Json(serde_json::json!({ "providers": state.oauth.list_providers() })).into_response()
}

/// GET /auth/oauth/:provider: park a single-use state and redirect to the
/// provider's authorization endpoint.
async fn oauth_start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Response> {
    let oauth_state = generate_state(STATE_BYTES)?;
    let auth_url = state.oauth.authorization_url(&provider, &oauth_state)?;
    state.oauth_states.store(&oauth_state).await?;

    tracing::info!(provider = %provider, "starting OAuth flow");
    Ok(Redirect::temporary(&auth_url).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// GET /auth/oauth/:provider/callback: consume the state, exchange the
/// code, find or create the user, and land on the front-end dashboard.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Response> {
    // The state must consume exactly once, before anything else runs.
    let presented = params.state.unwrap_or_default();
    if !state.oauth_states.consume(&presented).await? {
        tracing::warn!(provider = %provider, "OAuth callback with unknown or reused state");
        return Err(AppError::InvalidState);
    }

    // The user declined at the provider; send them back with a flash.
    if let Some(error) = params.error {
        tracing::warn!(provider = %provider, error = %error, "OAuth flow denied by provider");
        let front = frontend_origin(&state);
        return Ok(Redirect::temporary(&format!("{front}/?error=oauth_failed")).into_response());
    }

    let code = params.code.filter(|c| !c.is_empty()).ok_or(AppError::MissingCode)?;

    let profile = state.oauth.exchange(&provider, &code).await?;
    tracing::info!(
        provider = %provider,
        provider_id = %profile.provider_id,
        "OAuth exchange succeeded"
    );

    let user = find_or_create_user(&state, &profile).await?;

    let access_token = state.tokens.mint(TokenKind::Access, &user)?;
    let refresh_token = state.tokens.mint(TokenKind::Refresh, &user)?;
    let _session_id = super::auth::establish_session(&state, &user, &headers).await;

    let jar = jar
        .add(super::auth::auth_cookie(
            &state,
            ACCESS_TOKEN_COOKIE,
            access_token,
            state.config.access_token_seconds(),
        ))
        .add(super::auth::auth_cookie(
            &state,
            REFRESH_TOKEN_COOKIE,
            refresh_token,
            state.config.refresh_token_seconds(),
        ));

    let front = frontend_origin(&state);
    Ok((jar, Redirect::temporary(&format!("{front}/dashboard"))).into_response())
}

/// Link by verified email when the account exists; otherwise create one
/// with a username derived from the profile.
async fn find_or_create_user(state: &Arc<AppState>, profile: &OAuthProfile) -> Result<User> {
    if let Some(existing) = state.db.get_user_by_email(&profile.email).await? {
        if !existing.active {
            return Err(AppError::InvalidCredentials);
        }
        return Ok(existing);
    }

    let username = derive_username(state, &profile.display_name, &profile.email).await?;
    let user = User {
        id: Uuid::new_v4(),
        username,
        email: profile.email.clone(),
        password_hash: String::new(),
        role: "user".to_string(),
        active: true,
        mfa_enabled: false,
        mfa_secret: None,
        backup_codes: None,
        created_at: Utc::now(),
    };
    state.db.create_user(&user).await?;
    tracing::info!(user_id = %user.id, provider = %profile.provider, "user created from OAuth profile");
    Ok(user)
}

/// Sanitise the display name into a unique username, suffixing on collision.
async fn derive_username(state: &Arc<AppState>, display_name: &str, email: &str) -> Result<String> {
    let mut base: String = display_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(40)
        .collect();
    if base.len() < 3 {
        base = email.split('@').next().unwrap_or("user").to_string();
        base.retain(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    }
    if base.len() < 3 {
        base = "user".to_string();
    }

    if state.db.get_user_by_username(&base).await?.is_none() {
        return Ok(base);
    }
    for _ in 0..5 {
        let candidate = format!("{base}-{}", &generate_state(4)?[..6]);
        if state.db.get_user_by_username(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "could not derive a unique username"
    )))
}

fn frontend_origin(state: &Arc<AppState>) -> String {
    state
        .config
        .cors_allow_origins
        .first()
        .cloned()
        .unwrap_or_else(|| "http://localhost:3000".to_string())
}

