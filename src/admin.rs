// src/admin.rs

use crate::{
    error::{AppError, Result},
    pool::PoolStatus,
    state::AppState,
};
use axum::{
    extract::State,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Operator endpoints for inspecting and managing the key pool.
///
/// Update and rotate sit behind the admin token guard; the read-only routes
/// stay open.
pub fn admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let authed_routes = Router::new()
        .route("/api/keys/update", post(update_keys))
        .route("/api/keys/rotate", post(rotate_key))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::admin_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/keys/status", get(pool_status))
        .merge(authed_routes)
}

// --- Request/Response Structs ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub api_key_configured: bool,
    pub key_pool_status: PoolStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub data: PoolStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateKeysRequest {
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Caller identification, logged only.
    #[serde(default)]
    pub app_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoolChangeResponse {
    pub success: bool,
    pub message: String,
    pub pool_status: PoolStatus,
}

// --- Handlers ---

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        api_key_configured: !state.pool.is_empty(),
        key_pool_status: state.pool.status(),
    })
}

pub async fn pool_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        data: state.pool.status(),
    })
}

pub async fn update_keys(
    State(state): State<Arc<AppState>>,
    body: Option<Json<UpdateKeysRequest>>,
) -> Result<Json<PoolChangeResponse>> {
    let Json(request) = body.ok_or_else(|| AppError::invalid_request("No data provided"))?;
    let app_name = request.app_name.as_deref().unwrap_or("unknown");
    info!(
        app_name,
        received = request.api_keys.len(),
        "Received API key update request"
    );

    if request.api_keys.is_empty() {
        return Err(AppError::invalid_request("No API keys provided"));
    }

    if !state.pool.update_keys(&request.api_keys) {
        return Err(AppError::invalid_request(
            "Failed to update API key pool: no valid API keys provided",
        ));
    }

    let pool_status = state.pool.status();
    Ok(Json(PoolChangeResponse {
        success: true,
        message: format!(
            "Successfully updated API key pool with {} keys",
            pool_status.total_keys
        ),
        pool_status,
    }))
}

pub async fn rotate_key(State(state): State<Arc<AppState>>) -> Result<Json<PoolChangeResponse>> {
    if !state.pool.rotate() {
        return Err(AppError::RotationUnavailable {
            pool_size: state.pool.len(),
        });
    }

    Ok(Json(PoolChangeResponse {
        success: true,
        message: "API key rotated successfully".to_string(),
        pool_status: state.pool.status(),
    }))
}
