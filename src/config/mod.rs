// src/config/mod.rs

pub mod app;
pub mod loader;
pub mod validation;

pub use app::{AppConfig, PoolConfig, RetryConfig, ServerConfig, UpstreamConfig};
pub use loader::{load_config, resolve_config_path, DEFAULT_CONFIG_PATH};
pub use validation::ConfigValidator;
