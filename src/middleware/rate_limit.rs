// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Sliding-window rate limiting.
//!
//! The general limiter admits `RATE_LIMIT_RPM` requests per client per
//! minute; the MFA limiter allows 5 TOTP attempts per 5 minutes. Buckets are
//! per-client timestamp lists trimmed on every check; a background sweeper
//! evicts clients that went quiet.

use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// General limiter window.
pub const GENERAL_WINDOW: Duration = Duration::from_secs(60);
/// MFA limiter: 5 attempts per 5 minutes.
pub const MFA_LIMIT: usize = 5;
pub const MFA_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Counts distinct request timestamps inside a window ending at now.
pub struct SlidingWindowLimiter {
    buckets: DashMap<String, Vec<Instant>>,
    limit: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            limit,
            window,
        }
    }

    /// Record an attempt for `key`. Returns false when the client is over
    /// its limit; the attempt is only counted when admitted.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);
        if entry.len() >= self.limit {
            return false;
        }
        entry.push(now);
        true
    }

    /// Evict clients with no requests inside the window.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.buckets.retain(|_, times| {
            times.retain(|t| now.duration_since(*t) < self.window);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Handle to a periodic background task; `stop` signals it and joins.
pub struct Sweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Run `tick` every `interval` until stopped.
    pub fn spawn<F>(name: &'static str, interval: Duration, tick: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (shutdown, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => tick(),
                    _ = rx.changed() => {
                        tracing::debug!(sweeper = name, "sweeper stopped");
                        return;
                    }
                }
            }
        });
        Self { shutdown, handle }
    }

    /// Signal the task and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

/// Client identity for rate limiting: forwarded address when present, else
/// the peer address.
pub fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if !forwarded.is_empty() {
            return forwarded.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// General per-client limiter. Health and metrics probes bypass it.
pub async fn general_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if path == "/health" || path == "/metrics" {
        return next.run(request).await;
    }

    let key = client_key(&request);
    if !state.rate_limiter.check(&key) {
        return too_many_requests("60", "rate_limit_exceeded", "Too many requests");
    }

    next.run(request).await
}

/// Aggressive limiter for TOTP verification, applied only to that route.
pub async fn mfa_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    if !state.mfa_limiter.check(&key) {
        return too_many_requests(
            "300",
            "mfa_rate_limit",
            "Too many MFA attempts. Try again in 5 minutes.",
        );
    }

    next.run(request).await
}

fn too_many_requests(retry_after: &'static str, error: &str, message: &str) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after)],
        Json(serde_json::json!({ "error": error, "message": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_admits_n_rejects_n_plus_one() {
        let limiter = SlidingWindowLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
    }

    #[test]
    fn test_window_slides() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(30));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("a"));
    }

    #[test]
    fn test_rejected_attempts_are_not_counted() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_millis(30));
        assert!(limiter.check("a"));
        // A stream of rejected attempts must not extend the lockout.
        assert!(!limiter.check("a"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("a"));
    }

    #[test]
    fn test_sweep_evicts_idle_buckets() {
        let limiter = SlidingWindowLimiter::new(5, Duration::from_millis(10));
        limiter.check("a");
        limiter.check("b");
        assert_eq!(limiter.bucket_count(), 2);
        std::thread::sleep(Duration::from_millis(20));
        limiter.sweep();
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_stops_cleanly() {
        let limiter = Arc::new(SlidingWindowLimiter::new(5, Duration::from_secs(60)));
        let swept = limiter.clone();
        let sweeper = Sweeper::spawn("test", Duration::from_millis(5), move || swept.sweep());
        tokio::time::sleep(Duration::from_millis(20)).await;
        sweeper.stop().await;
    }
}
