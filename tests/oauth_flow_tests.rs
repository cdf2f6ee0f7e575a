// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! OAuth route tests: provider listing, flow start, and state discipline
//! at the callback.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

fn config_with_github() -> kyros_gateway::config::Config {
    let mut config = common::test_config();
    config.github_client_id = "test-github-id".to_string();
    config.github_client_secret = "test-github-secret".to_string();
    config
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_providers_empty_when_unconfigured() {
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/oauth/providers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["providers"], serde_json::json!([]));
}

#[tokio::test]
async fn test_start_with_unconfigured_provider() {
    let app = common::test_app(common::test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/oauth/google")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_provider");
}

#[tokio::test]
async fn test_start_redirects_with_state() {
    let app = common::test_app(config_with_github());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/oauth/github")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
    assert!(location.contains("client_id=test-github-id"));
    assert!(location.contains("state="));
}

#[tokio::test]
async fn test_callback_with_stale_state() {
    // State was never stored (or already consumed): the callback refuses
    // before touching the provider.
    let app = common::test_app(config_with_github());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/oauth/github/callback?state=STALE&code=CODE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_state");
}

#[tokio::test]
async fn test_callback_without_state() {
    let app = common::test_app(config_with_github());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/oauth/github/callback?code=CODE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_state");
}

#[tokio::test]
async fn test_admin_snapshot_hides_secrets() {
    let app = common::test_app(config_with_github());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/providers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("test-github-id"));
    assert!(!text.contains("test-github-secret"));
}
