// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! HTTP route handlers and router assembly.

pub mod auth;
pub mod mfa;
pub mod oauth;
pub mod projects;
pub mod proxy;
pub mod sessions;

use crate::middleware::{csrf, populate_auth, rate_limit, security};
use crate::AppState;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{middleware as axum_middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY: usize = 1 << 20;

/// Deadline on handling a single request, body write included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub env: String,
    pub features: serde_json::Value,
}

/// Health check response; bypasses rate limiting. The process stays "ok"
/// while a dependency is down; the probe result is reported per feature.
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = state.db.ping().await.is_ok();

    Json(HealthResponse {
        status: "ok".to_string(),
        env: state.config.environment.clone(),
        features: serde_json::json!({
            "rate_limiting": true,
            "database": database,
            "caching": state.cache.is_some(),
            "sessions": state.sessions.is_some(),
            "oauth_providers": state.oauth.list_providers(),
            "terminal": state.config.enable_terminal,
        }),
    })
}

/// Build the complete router with the admission chain.
///
/// Layer order, outermost first: panic guard, access log, request timeout,
/// general rate limit, CORS, security headers, CSRF, auth populate. The MFA
/// limiter is applied inside `mfa::routes` to the verify endpoint only.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = build_cors(&state.config.cors_allow_origins);

    let auth_routes = auth::routes()
        .merge(oauth::routes())
        .merge(mfa::routes(state.clone()))
        .merge(sessions::routes());

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .merge(projects::routes())
        .fallback(proxy::proxy_worker)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            populate_auth,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            csrf::csrf_protection,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            security::add_security_headers,
        ))
        .layer(cors)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit::general_rate_limit,
        ))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// CORS for the configured exact origins.
fn build_cors(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::list(parsed))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::HeaderName::from_static("x-csrf-token"),
            header::HeaderName::from_static("x-session-id"),
        ])
        .max_age(Duration::from_secs(300))
}

/// Recover a handler panic into a generic 500. Never re-panics.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = %detail, "panic recovered");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": "internal_error",
            "message": "An unexpected error occurred",
        })),
    )
        .into_response()
}
