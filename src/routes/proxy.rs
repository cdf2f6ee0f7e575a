// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Reverse proxy: unmatched paths are forwarded to the worker service.
//!
//! The upstream URL determines the Host the worker sees; hop-by-hop headers
//! are stripped in both directions. A worker that cannot be reached surfaces
//! as 502.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::AppState;

/// Largest body the proxy will buffer, matching the gateway's request cap.
const MAX_PROXY_BODY: usize = 1 << 20;

/// Connection-level headers that must not be forwarded (RFC 9110 §7.6.1).
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Fallback handler forwarding requests under the configured prefix to
/// `WORKER_BASE_URL`; anything else is an unknown route.
pub async fn proxy_worker(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response> {
    if !request
        .uri()
        .path()
        .starts_with(&state.config.worker_proxy_prefix)
    {
        return Err(AppError::NotFound("Route".to_string()));
    }

    let path_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let url = format!(
        "{}{}",
        state.config.worker_base_url.trim_end_matches('/'),
        path_query
    );

    let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
        .map_err(|_| AppError::Validation("unsupported method".to_string()))?;

    let mut upstream_headers = reqwest::header::HeaderMap::new();
    for (name, value) in request.headers() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            upstream_headers.append(name, value);
        }
    }

    let body = axum::body::to_bytes(request.into_body(), MAX_PROXY_BODY)
        .await
        .map_err(|_| AppError::Validation("request body too large".to_string()))?;

    tracing::debug!(method = %method, url = %url, "proxying request to worker");

    let upstream = state
        .worker_http
        .request(method, url)
        .headers(upstream_headers)
        .body(body)
        .send()
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|_| AppError::BadGateway("invalid upstream status".to_string()))?;

    let mut response_headers = axum::http::HeaderMap::new();
    for (name, value) in upstream.headers() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response_headers.append(name, value);
        }
    }

    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    let mut response = (status, Body::from(bytes)).into_response();
    response.headers_mut().extend(response_headers);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop_filter() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(is_hop_by_hop("HOST"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("authorization"));
    }
}
