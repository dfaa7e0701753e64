// src/state.rs

use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::MetricsHandle;
use crate::pool::{KeyPool, PoolSettings};
use crate::retry::RetryPolicy;
use crate::storage::FileStore;
use crate::upstream::UpstreamClient;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state handed to every Axum handler.
pub struct AppState {
    pub config: AppConfig,
    pub pool: Arc<KeyPool>,
    pub retry_policy: RetryPolicy,
    pub upstream: UpstreamClient,
    pub metrics: Option<MetricsHandle>,
}

impl AppState {
    /// Build the state for a server run: a file-backed pool restored from its
    /// snapshot, or seeded from the configured keys when there is none.
    pub fn new(config: AppConfig) -> Result<Self> {
        info!(
            snapshot.path = %config.pool.snapshot_path.display(),
            "Initializing key pool"
        );
        let store = Arc::new(FileStore::new(config.pool.snapshot_path.clone()));
        let pool = KeyPool::new(store, PoolSettings::from(&config.pool));

        if !pool.restore() {
            let seed = config.seed_keys();
            if seed.is_empty() {
                warn!("No API keys configured; the pool stays empty until keys are provided");
            } else if pool.update_keys(&seed) {
                info!(pool.size = pool.len(), "Seeded key pool from configuration");
            }
        }

        Self::with_pool(config, Arc::new(pool))
    }

    /// Build the state around an existing pool.
    pub fn with_pool(config: AppConfig, pool: Arc<KeyPool>) -> Result<Self> {
        let upstream = UpstreamClient::new(&config.server, &config.upstream)?;
        Ok(Self {
            retry_policy: RetryPolicy::from(&config.retry),
            upstream,
            pool,
            config,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: Option<MetricsHandle>) -> Self {
        self.metrics = handle;
        self
    }
}
