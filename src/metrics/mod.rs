//! Pool metrics.
//!
//! Counters go through the `metrics` facade and are rendered by the
//! Prometheus exporter. Without the `metrics` feature every recorder call is
//! a no-op and `/metrics` answers 404.

use crate::classify::FailureKind;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

#[cfg(feature = "metrics")]
mod recorder {
    use crate::classify::FailureKind;
    use metrics::{counter, gauge};
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
    use tracing::warn;

    pub type MetricsHandle = PrometheusHandle;

    pub fn install() -> Option<MetricsHandle> {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Failed to install Prometheus recorder; metrics disabled");
                None
            }
        }
    }

    pub fn render(handle: &MetricsHandle) -> String {
        handle.render()
    }

    pub fn record_acquisition() {
        counter!("key_pool_acquisitions_total").increment(1);
    }

    pub fn record_success() {
        counter!("key_pool_upstream_successes_total").increment(1);
    }

    pub fn record_rotation() {
        counter!("key_pool_rotations_total").increment(1);
    }

    pub fn record_upstream_failure(kind: FailureKind) {
        counter!("key_pool_upstream_failures_total", "kind" => kind.as_str()).increment(1);
    }

    pub fn record_persist_failure() {
        counter!("key_pool_persist_failures_total").increment(1);
    }

    pub fn record_retries_exhausted() {
        counter!("key_pool_retries_exhausted_total").increment(1);
    }

    pub fn set_pool_size(size: usize) {
        gauge!("key_pool_keys").set(size as f64);
    }
}

#[cfg(not(feature = "metrics"))]
mod recorder {
    use crate::classify::FailureKind;

    #[derive(Debug, Clone)]
    pub struct MetricsHandle;

    pub fn install() -> Option<MetricsHandle> {
        None
    }

    pub fn render(_handle: &MetricsHandle) -> String {
        String::new()
    }

    pub fn record_acquisition() {}
    pub fn record_success() {}
    pub fn record_rotation() {}
    pub fn record_upstream_failure(_kind: FailureKind) {}
    pub fn record_persist_failure() {}
    pub fn record_retries_exhausted() {}
    pub fn set_pool_size(_size: usize) {}
}

pub use recorder::MetricsHandle;

/// Install the global recorder. Call once, from `main`.
pub fn install_recorder() -> Option<MetricsHandle> {
    recorder::install()
}

pub fn record_acquisition() {
    recorder::record_acquisition();
}

pub fn record_success() {
    recorder::record_success();
}

pub fn record_rotation() {
    recorder::record_rotation();
}

pub fn record_upstream_failure(kind: FailureKind) {
    recorder::record_upstream_failure(kind);
}

pub fn record_persist_failure() {
    recorder::record_persist_failure();
}

pub fn record_retries_exhausted() {
    recorder::record_retries_exhausted();
}

pub fn set_pool_size(size: usize) {
    recorder::set_pool_size(size);
}

/// Prometheus text exposition.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.as_ref() {
        Some(handle) => (StatusCode::OK, recorder::render(handle)),
        None => (
            StatusCode::NOT_FOUND,
            "metrics recorder not installed\n".to_string(),
        ),
    }
}
