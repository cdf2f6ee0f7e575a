// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Auth route tests that run without external services: health shape,
//! CORS preflight, protected-route gating, validation, and logout.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_degraded_features() {
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["env"], "test");
    // No Redis in the test state: cache-backed features report disabled.
    assert_eq!(json["features"]["caching"], false);
    assert_eq!(json["features"]["sessions"], false);
    assert_eq!(json["features"]["rate_limiting"], true);
    // The database probe reports whatever it finds; the endpoint stays 200
    // either way.
    assert!(json["features"]["database"].is_boolean());
}

#[tokio::test]
async fn test_me_requires_auth() {
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn test_me_rejects_invalid_token() {
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header(header::AUTHORIZATION, "Bearer invalid.token.here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_rejects_refresh_token() {
    // A refresh token must not be accepted where an access token is
    // expected, even though it is validly signed.
    use chrono::Utc;
    use kyros_gateway::models::User;
    use kyros_gateway::services::tokens::{TokenCodec, TokenKind};
    use uuid::Uuid;

    let config = common::test_config();
    let codec = TokenCodec::new(&config.jwt_secret_key, 900, 7 * 24 * 3600, false);
    let user = User {
        id: Uuid::new_v4(),
        username: "ops".into(),
        email: "o@x.io".into(),
        password_hash: String::new(),
        role: "user".into(),
        active: true,
        mfa_enabled: false,
        mfa_secret: None,
        backup_codes: None,
        created_at: Utc::now(),
    };
    let refresh = codec.mint(TokenKind::Refresh, &user).unwrap();

    let app = common::test_app(config);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation_error() {
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/register")
                .header(header::AUTHORIZATION, "Bearer x")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"username":"ab","email":"not-an-email","password":"Abcd!234"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_refresh_without_token_unauthorized() {
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/refresh")
                .header(header::AUTHORIZATION, "Bearer x")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_is_idempotent_and_clears_cookies() {
    let app = common::test_app(common::test_config());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header(header::AUTHORIZATION, "Bearer whatever")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("access_token=;")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=;")));
    }
}

#[tokio::test]
async fn test_ws_token_requires_auth() {
    // The 401 gate comes before the cache-availability check.
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/ws-token")
                .header(header::AUTHORIZATION, "Bearer x")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sessions_require_auth() {
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/sessions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/auth/login")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:3000"
    );
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_unknown_origin_gets_no_cors_headers() {
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
