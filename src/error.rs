// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Email already registered")]
    EmailExists,

    #[error("Username already registered")]
    UsernameExists,

    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("OAuth provider '{0}' not configured")]
    InvalidProvider(String),

    #[error("Invalid or expired OAuth state")]
    InvalidState,

    #[error("OAuth authorization code missing")]
    MissingCode,

    #[error("OAuth exchange failed: {0}")]
    OAuthFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid identifier")]
    InvalidId,

    #[error("Feature unavailable: {0}")]
    Unavailable(String),

    #[error("Worker unreachable: {0}")]
    BadGateway(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Cache error")]
    Cache(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, details) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication required".to_string(),
                None,
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Incorrect email or password".to_string(),
                None,
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Request validation failed".to_string(),
                Some(msg.clone()),
            ),
            AppError::EmailExists => (
                StatusCode::BAD_REQUEST,
                "email_exists",
                "Email already registered".to_string(),
                None,
            ),
            AppError::UsernameExists => (
                StatusCode::BAD_REQUEST,
                "username_exists",
                "Username already registered".to_string(),
                None,
            ),
            AppError::WeakPassword(msg) => {
                (StatusCode::BAD_REQUEST, "weak_password", msg.clone(), None)
            }
            AppError::InvalidCode => (
                StatusCode::BAD_REQUEST,
                "invalid_code",
                "Invalid verification code".to_string(),
                None,
            ),
            AppError::InvalidProvider(name) => (
                StatusCode::BAD_REQUEST,
                "invalid_provider",
                format!("OAuth provider '{name}' not configured"),
                None,
            ),
            AppError::InvalidState => (
                StatusCode::BAD_REQUEST,
                "invalid_state",
                "Invalid or expired OAuth state".to_string(),
                None,
            ),
            AppError::MissingCode => (
                StatusCode::BAD_REQUEST,
                "missing_code",
                "OAuth code missing".to_string(),
                None,
            ),
            AppError::OAuthFailed(msg) => (
                StatusCode::BAD_REQUEST,
                "oauth_failed",
                "Failed to authenticate with provider".to_string(),
                Some(msg.clone()),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{what} not found"),
                None,
            ),
            AppError::InvalidId => (
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "Invalid identifier".to_string(),
                None,
            ),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                msg.clone(),
                None,
            ),
            AppError::BadGateway(msg) => {
                tracing::error!(error = %msg, "Worker proxy failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "bad_gateway",
                    "Upstream worker unreachable".to_string(),
                    None,
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An unexpected error occurred".to_string(),
                    None,
                )
            }
            AppError::Cache(err) => {
                tracing::error!(error = %err, "Cache error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An unexpected error occurred".to_string(),
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An unexpected error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_errors_keep_stable_codes() {
        let response = AppError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AppError::InvalidState.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            AppError::Unavailable("Session management requires Redis".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let response = AppError::Internal(anyhow::anyhow!("secret pool detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("internal_error"));
        assert!(!text.contains("secret pool detail"));
    }
}
