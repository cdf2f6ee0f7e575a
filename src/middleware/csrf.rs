// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! CSRF protection via double-submit cookie.
//!
//! Safe methods receive a `csrf_token` cookie; unsafe methods must echo it in
//! `X-CSRF-Token` and the value must still be live in the server-side table.
//! Requests carrying `Authorization` are API clients and skip the check.

use crate::services::crypto::generate_state;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Server-side validity window for issued tokens.
const TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);
const TOKEN_BYTES: usize = 32;

/// Issues and validates CSRF tokens.
pub struct CsrfProtection {
    tokens: DashMap<String, Instant>,
    secure_cookies: bool,
}

impl CsrfProtection {
    pub fn new(secure_cookies: bool) -> Self {
        Self {
            tokens: DashMap::new(),
            secure_cookies,
        }
    }

    /// Mint a token and record its issue time.
    pub fn generate(&self) -> crate::error::Result<String> {
        let token = generate_state(TOKEN_BYTES)?;
        self.tokens.insert(token.clone(), Instant::now());
        Ok(token)
    }

    /// True while the token is known and inside its lifetime.
    pub fn validate(&self, token: &str) -> bool {
        match self.tokens.get(token) {
            Some(issued) => issued.elapsed() < TOKEN_LIFETIME,
            None => false,
        }
    }

    /// Drop expired tokens.
    pub fn sweep(&self) {
        self.tokens
            .retain(|_, issued| issued.elapsed() < TOKEN_LIFETIME);
    }

    fn issue_cookie(&self, token: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(CSRF_COOKIE, token);
        cookie.set_path("/");
        cookie.set_same_site(SameSite::Strict);
        // Double-submit requires the frontend to read the value back.
        cookie.set_http_only(false);
        cookie.set_secure(self.secure_cookies);
        cookie.set_max_age(time::Duration::seconds(TOKEN_LIFETIME.as_secs() as i64));
        cookie
    }

    #[cfg(test)]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// CSRF middleware for the double-submit flow.
pub async fn csrf_protection(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    // Bearer-authenticated API clients cannot be driven by a browser form.
    if request.headers().contains_key(header::AUTHORIZATION) {
        return next.run(request).await;
    }

    let method = request.method().clone();
    if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
        let has_cookie = jar.get(CSRF_COOKIE).is_some();
        let mut response = next.run(request).await;

        if !has_cookie {
            if let Ok(token) = state.csrf.generate() {
                let cookie = state.csrf.issue_cookie(token);
                if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
            }
        }
        return response;
    }

    // State-changing method: header and cookie must both be present...
    let header_token = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let cookie_token = jar
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default();

    if header_token.is_empty() || cookie_token.is_empty() {
        return forbidden("csrf_token_missing", "CSRF token required");
    }

    // ...equal, and still valid server-side.
    let matches: bool = header_token
        .as_bytes()
        .ct_eq(cookie_token.as_bytes())
        .into();
    if !matches || !state.csrf.validate(&header_token) {
        return forbidden("csrf_token_invalid", "Invalid CSRF token");
    }

    next.run(request).await
}

fn forbidden(error: &str, message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": error, "message": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_validates_once_issued() {
        let csrf = CsrfProtection::new(false);
        let token = csrf.generate().unwrap();
        assert!(csrf.validate(&token));
        assert!(!csrf.validate("never-issued"));
    }

    #[test]
    fn test_tokens_are_unique() {
        let csrf = CsrfProtection::new(false);
        assert_ne!(csrf.generate().unwrap(), csrf.generate().unwrap());
    }

    #[test]
    fn test_sweep_keeps_live_tokens() {
        let csrf = CsrfProtection::new(false);
        let token = csrf.generate().unwrap();
        csrf.sweep();
        assert_eq!(csrf.token_count(), 1);
        assert!(csrf.validate(&token));
    }

    #[test]
    fn test_cookie_attributes() {
        let csrf = CsrfProtection::new(true);
        let cookie = csrf.issue_cookie("tok".to_string());
        assert_eq!(cookie.name(), CSRF_COOKIE);
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.http_only(), Some(false));
        assert_eq!(cookie.secure(), Some(true));
    }
}
