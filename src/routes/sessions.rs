// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Session enumeration and revocation routes.
//!
//! All three require authentication. Without Redis the list degrades to a
//! stub and mutations return 503.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Extension, Json, Router,
};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::SESSION_ID_HEADER;
use crate::middleware::{require_auth, CurrentUser};
use crate::services::SessionRegistry;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions).delete(revoke_all_sessions))
        .route("/sessions/:id", delete(revoke_session))
        .route_layer(axum::middleware::from_fn(require_auth))
}

fn registry(state: &Arc<AppState>) -> Result<&SessionRegistry> {
    state.sessions.as_ref().ok_or_else(|| {
        AppError::Unavailable("Session management requires Redis".to_string())
    })
}

/// GET /auth/sessions
async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Response> {
    let Some(registry) = state.sessions.as_ref() else {
        // Reads degrade to an empty stub rather than failing.
        return Ok(Json(serde_json::json!({
            "sessions": [],
            "message": "Session management requires Redis",
        }))
        .into_response());
    };

    let sessions = registry.list(user.id).await?;
    Ok(Json(serde_json::json!({ "sessions": sessions })).into_response())
}

/// DELETE /auth/sessions/:id
async fn revoke_session(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> Result<Response> {
    if session_id.is_empty() {
        return Err(AppError::InvalidId);
    }
    registry(&state)?.revoke(&session_id, user.id).await?;

    tracing::info!(user_id = %user.id, session_id = %session_id, "session revoked");
    Ok(Json(serde_json::json!({ "revoked": true })).into_response())
}

/// DELETE /auth/sessions: revoke every other session, keeping the one
/// named by `X-Session-ID`.
async fn revoke_all_sessions(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
) -> Result<Response> {
    let registry = registry(&state)?;

    let current = headers
        .get(SESSION_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if current.is_empty() {
        registry.revoke_all(user.id).await?;
    } else {
        registry.revoke_all_except(user.id, current).await?;
    }

    tracing::info!(user_id = %user.id, kept = %current, "sessions revoked");
    Ok(Json(serde_json::json!({ "revoked_all": true })).into_response())
}
