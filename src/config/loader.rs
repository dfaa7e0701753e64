// src/config/loader.rs

use crate::config::{AppConfig, ConfigValidator};
use crate::error::{AppError, Result};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Resolve the configuration path: explicit argument, then `KEY_POOL_CONFIG`,
/// then [`DEFAULT_CONFIG_PATH`].
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("KEY_POOL_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from file (if present), apply environment overrides and
/// validate the result.
pub fn load_config(config_path: &Path) -> Result<AppConfig> {
    let mut config = if config_path.exists() {
        info!("Loading configuration from file: {}", config_path.display());
        load_from_file(config_path)?
    } else {
        info!(
            "Configuration file {} not found, using defaults",
            config_path.display()
        );
        AppConfig::default()
    };

    override_with_env(&mut config);

    ConfigValidator::validate(&config)?;

    debug!("Configuration loaded and validated successfully");
    Ok(config)
}

fn load_from_file(config_path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(config_path).map_err(|e| AppError::Io {
        operation: "read_config".to_string(),
        message: format!("{}: {}", config_path.display(), e),
    })?;

    if content.trim().is_empty() {
        warn!("Configuration file is empty, using defaults");
        return Ok(AppConfig::default());
    }

    Ok(serde_yaml::from_str(&content)?)
}

fn override_with_env(config: &mut AppConfig) {
    if let Ok(host) = std::env::var("KEY_POOL_HOST") {
        info!("Overriding server host from environment variable: {}", host);
        config.server.host = host;
    }

    // KEY_POOL_PORT wins over the generic PORT.
    for var in ["PORT", "KEY_POOL_PORT"] {
        if let Ok(port_str) = std::env::var(var) {
            match port_str.parse::<u16>() {
                Ok(port) => {
                    info!("Overriding server port from {}: {}", var, port);
                    config.server.port = port;
                }
                Err(_) => warn!("Invalid {} environment variable: {}", var, port_str),
            }
        }
    }

    if let Ok(token) = std::env::var("KEY_POOL_ADMIN_TOKEN") {
        if !token.trim().is_empty() {
            info!("Admin token set from environment variable");
            config.server.admin_token = Some(SecretString::new(token));
        }
    }

    if let Ok(path) = std::env::var("KEY_POOL_SNAPSHOT_PATH") {
        info!("Overriding snapshot path from environment variable: {}", path);
        config.pool.snapshot_path = PathBuf::from(path);
    }

    if let Ok(raw) = std::env::var("GEMINI_API_KEY") {
        let before = config.pool.api_keys.len();
        config.pool.api_keys.extend(
            raw.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .filter(|k| !config.pool.placeholder_keys.iter().any(|p| p == k))
                .map(str::to_string),
        );
        let added = config.pool.api_keys.len() - before;
        if added > 0 {
            info!("Added {} seed key(s) from GEMINI_API_KEY", added);
        } else {
            warn!("GEMINI_API_KEY is set but holds no usable key");
        }
    }
}
