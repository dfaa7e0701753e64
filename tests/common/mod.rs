//! Common test utilities and fixtures

#![allow(dead_code)]

use axum::{body::Body, http::Response};
use gemini_key_pool::{
    config::AppConfig, create_router, AppState, InMemoryStore, KeyPool, PoolSettings,
};
use serde_json::Value;
use std::sync::Arc;

/// Pool over an in-memory store, loaded with `keys`.
pub fn pool_with_keys(keys: &[&str]) -> (Arc<KeyPool>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let pool = KeyPool::new(store.clone(), PoolSettings::default());
    if !keys.is_empty() {
        assert!(pool.update_keys(keys.iter().copied()));
    }
    (Arc::new(pool), store)
}

/// Test configuration builder
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_admin_token(mut self, token: &str) -> Self {
        self.config.server.admin_token = Some(secrecy::SecretString::new(token.to_string()));
        self
    }

    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.config.upstream.target_url = url.into();
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Router plus handles on the pool and its store.
pub struct TestApp {
    pub router: axum::Router,
    pub pool: Arc<KeyPool>,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    pub fn new(config: AppConfig, keys: &[&str]) -> Self {
        let (pool, store) = pool_with_keys(keys);
        let state = AppState::with_pool(config, pool.clone()).unwrap();
        Self {
            router: create_router(Arc::new(state)),
            pool,
            store,
        }
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
