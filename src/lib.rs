// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Kyros edge gateway.
//!
//! Terminates client HTTP traffic, authenticates requests, enforces abuse
//! limits, manages interactive sessions, and forwards authorised traffic to
//! the internal worker service.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use cache::KvCache;
use config::Config;
use db::Db;
use middleware::{CsrfProtection, SlidingWindowLimiter};
use services::{
    EventPublisher, OAuthManager, OAuthStateStore, PendingEnrollments, SessionRegistry, TokenCodec,
    TokenEncryptor,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    /// Absent cache degrades sessions, state persistence, and revocation.
    pub cache: Option<KvCache>,
    pub tokens: TokenCodec,
    pub encryptor: TokenEncryptor,
    pub oauth: OAuthManager,
    pub oauth_states: OAuthStateStore,
    pub enrollments: PendingEnrollments,
    pub sessions: Option<SessionRegistry>,
    pub events: EventPublisher,
    pub rate_limiter: SlidingWindowLimiter,
    pub mfa_limiter: SlidingWindowLimiter,
    pub csrf: CsrfProtection,
    /// Client used for the worker reverse proxy.
    pub worker_http: reqwest::Client,
}

impl AppState {
    /// Assemble the state from connected resources.
    pub fn new(config: Config, db: Db, cache: Option<KvCache>) -> error::Result<Self> {
        let tokens = TokenCodec::new(
            &config.jwt_secret_key,
            config.access_token_seconds(),
            config.refresh_token_seconds(),
            config.is_production(),
        );
        let encryptor = TokenEncryptor::new(config.token_encryption_key.as_bytes())?;
        let oauth = OAuthManager::from_config(&config);
        let oauth_states = OAuthStateStore::new(cache.clone());
        let enrollments = PendingEnrollments::new(cache.clone());
        let sessions = cache
            .clone()
            .map(|cache| SessionRegistry::new(cache, config.session_ttl_seconds()));
        let events = EventPublisher::new(cache.clone());
        let rate_limiter = SlidingWindowLimiter::new(
            config.rate_limit_rpm,
            middleware::rate_limit::GENERAL_WINDOW,
        );
        let mfa_limiter = SlidingWindowLimiter::new(
            middleware::rate_limit::MFA_LIMIT,
            middleware::rate_limit::MFA_WINDOW,
        );
        let csrf = CsrfProtection::new(config.is_production());

        Ok(Self {
            config,
            db,
            cache,
            tokens,
            encryptor,
            oauth,
            oauth_states,
            enrollments,
            sessions,
            events,
            rate_limiter,
            mfa_limiter,
            csrf,
            worker_http: reqwest::Client::new(),
        })
    }

    /// State for tests: lazy database pool, no cache. Queries against the
    /// pool fail at call time, which route tests treat like an unreachable
    /// database.
    pub fn for_tests(config: Config) -> Self {
        let db = Db::connect_lazy(&config.database_url).expect("lazy pool");
        Self::new(config, db, None).expect("test state")
    }
}
