// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

use kyros_gateway::{config::Config, routes::create_router, AppState};
use std::sync::Arc;

/// Check if a Redis server is available via environment variable.
#[allow(dead_code)]
pub fn redis_available() -> bool {
    std::env::var("REDIS_URL").is_ok()
}

/// Skip test with message if Redis not available.
#[macro_export]
macro_rules! require_redis {
    () => {
        if !crate::common::redis_available() {
            eprintln!("⚠️  Skipping: REDIS_URL not set");
            return;
        }
    };
}

/// Build a router over offline state: lazy Postgres pool, no Redis.
/// Database-touching handlers fail like they would with an unreachable
/// store; everything in front of them behaves normally.
#[allow(dead_code)]
pub fn test_app(config: Config) -> axum::Router {
    create_router(Arc::new(AppState::for_tests(config)))
}

#[allow(dead_code)]
pub fn test_config() -> Config {
    Config::test_default()
}
