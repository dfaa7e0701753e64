// src/config/app.rs

use crate::pool::DEFAULT_PLACEHOLDER_KEYS;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Guards the key update and rotate endpoints when set.
    #[serde(default, skip_serializing)]
    pub admin_token: Option<SecretString>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_token: None,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct PoolConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    #[serde(default = "default_preview_len")]
    pub preview_len: usize,
    #[serde(default = "default_placeholder_keys")]
    pub placeholder_keys: Vec<String>,
    /// Seed keys, used only when no snapshot exists.
    #[serde(default, skip_serializing)]
    pub api_keys: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            preview_len: default_preview_len(),
            placeholder_keys: default_placeholder_keys(),
            api_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause before retrying the same key when the pool cannot rotate.
    #[serde(default)]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_target_url")]
    pub target_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl AppConfig {
    /// Seed keys with blanks and placeholders removed.
    pub fn seed_keys(&self) -> Vec<String> {
        self.pool
            .api_keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .filter(|k| !self.pool.placeholder_keys.iter().any(|p| p == k))
            .map(str::to_string)
            .collect()
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    120
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("api_keys_pool.json")
}

fn default_preview_len() -> usize {
    10
}

fn default_placeholder_keys() -> Vec<String> {
    DEFAULT_PLACEHOLDER_KEYS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_target_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
