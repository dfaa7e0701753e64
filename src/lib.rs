// src/lib.rs

//! Gemini API key pool.
//!
//! A [`KeyPool`] rotates through interchangeable API keys, persisting its
//! cursor and usage counts. [`retry::call_with_rotation`] wraps any upstream
//! call so rate-limit and overload answers move the pool to the next key and
//! retry. The binary serves the pool over HTTP: operator endpoints plus a
//! passthrough to the Gemini API.

pub mod admin;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod pool;
pub mod proxy;
pub mod retry;
pub mod state;
pub mod storage;
pub mod upstream;

use axum::{
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use classify::{classify_failure, CallOutcome, FailureKind, UpstreamFailure};
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use pool::{KeyPool, PoolSettings, PoolStatus, RotationOutcome};
pub use retry::{call_with_rotation, RetryPolicy};
pub use state::AppState;
pub use storage::{FileStore, InMemoryStore, Persistence, Snapshot};

/// Build the application router: operator endpoints, metrics and the
/// Gemini passthrough, wrapped in request tracing and permissive CORS.
pub fn create_router(state: Arc<AppState>) -> Router {
    let proxy_routes = ["/v1/*path", "/v1beta/*path"];

    let mut router = Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .merge(admin::admin_routes(state.clone()));

    for path in proxy_routes {
        router = router.route(path, any(proxy::proxy_handler));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(middleware::trace_requests))
        .with_state(state)
}

/// Load configuration and build the shared state for a server run.
///
/// `overrides` runs after file and environment values are applied, so
/// command-line flags win; the result is validated again afterwards.
pub fn build_state(
    config_path: &std::path::Path,
    overrides: impl FnOnce(&mut AppConfig),
) -> Result<AppState> {
    let mut app_config = config::load_config(config_path).map_err(|e| {
        error!(
            config.path = %config_path.display(),
            error = %e,
            "Failed to load or validate configuration"
        );
        e
    })?;
    overrides(&mut app_config);
    config::ConfigValidator::validate(&app_config)?;

    info!(
        server.host = %app_config.server.host,
        server.port = app_config.server.port,
        snapshot.path = %app_config.pool.snapshot_path.display(),
        retry.max_attempts = app_config.retry.max_attempts,
        admin_token.configured = app_config.server.admin_token.is_some(),
        "Configuration loaded and validated"
    );

    AppState::new(app_config)
}
