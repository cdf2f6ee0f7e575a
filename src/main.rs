// SPDX-License-Identifier: MIT
// Copyright 2026 Kyros Praxis

//! Kyros API Gateway
//!
//! Terminates client traffic for the platform: authentication, sessions,
//! rate limiting, and reverse proxying to the internal worker service.

use kyros_gateway::{
    cache::KvCache,
    config::Config,
    db::Db,
    middleware::Sweeper,
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long in-flight requests get to drain after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        env = %config.environment,
        "Starting Kyros Gateway"
    );

    // Connect to Postgres
    let db = Db::connect(&config.database_url).await?;
    tracing::info!("Database connection pool initialized");

    // Connect to Redis when configured; the gateway degrades without it
    let cache = if config.redis_url.is_empty() {
        tracing::warn!("REDIS_URL not set; sessions, revocation, and WS tickets disabled");
        None
    } else {
        match KvCache::connect(&config.redis_url).await {
            Ok(cache) => {
                tracing::info!("Redis connection initialized");
                Some(cache)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Redis unavailable; cache features disabled");
                None
            }
        }
    };

    let port = config.port;
    let state = Arc::new(AppState::new(config, db, cache)?);

    if !state.oauth.list_providers().is_empty() {
        tracing::info!(providers = ?state.oauth.list_providers(), "OAuth providers configured");
    }

    // Background sweepers for the in-process stores
    let sweepers = spawn_sweepers(state.clone());

    // Build router and serve
    let app = kyros_gateway::routes::create_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    // Drain in-flight requests after a shutdown signal, but only for the
    // grace period; whatever is still open after that gets aborted.
    let (draining_tx, draining_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = draining_tx.send(());
    });

    tokio::select! {
        result = server => result?,
        _ = async {
            let _ = draining_rx.await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            tracing::warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "grace period elapsed, aborting remaining connections"
            );
        }
    }

    // Stop and join background tasks
    for sweeper in sweepers {
        sweeper.stop().await;
    }
    tracing::info!("Server stopped");
    Ok(())
}

/// Evict idle rate-limit buckets every five minutes, stale MFA attempt
/// buckets every minute, and expired CSRF tokens every five minutes.
fn spawn_sweepers(state: Arc<AppState>) -> Vec<Sweeper> {
    let general = state.clone();
    let mfa = state.clone();
    let csrf = state;
    vec![
        Sweeper::spawn("rate_limit", Duration::from_secs(5 * 60), move || {
            general.rate_limiter.sweep()
        }),
        Sweeper::spawn("mfa_limit", Duration::from_secs(60), move || {
            mfa.mfa_limiter.sweep()
        }),
        Sweeper::spawn("csrf", Duration::from_secs(5 * 60), move || {
            csrf.csrf.sweep()
        }),
    ]
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kyros_gateway=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
