// src/config/validation.rs

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use tracing::{debug, warn};
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> Result<()> {
        debug!("Starting configuration validation");

        if let Err(e) = Self::validate_server_config(config) {
            warn!("Server config validation failed: {}", e);
            return Err(e);
        }

        if let Err(e) = Self::validate_pool_config(config) {
            warn!("Pool config validation failed: {}", e);
            return Err(e);
        }

        if config.retry.max_attempts == 0 {
            return Err(AppError::config_validation(
                "Retry max_attempts must be at least 1",
                Some("retry.max_attempts"),
            ));
        }

        Self::validate_url(&config.upstream.target_url, "upstream.target_url")?;

        debug!("Configuration validation completed successfully");
        Ok(())
    }

    fn validate_server_config(config: &AppConfig) -> Result<()> {
        if config.server.port == 0 {
            return Err(AppError::config_validation(
                "Server port cannot be 0",
                Some("server.port"),
            ));
        }

        if config.server.connect_timeout_secs == 0 {
            return Err(AppError::config_validation(
                "Connect timeout cannot be 0",
                Some("server.connect_timeout_secs"),
            ));
        }

        if config.server.request_timeout_secs == 0 {
            return Err(AppError::config_validation(
                "Request timeout cannot be 0",
                Some("server.request_timeout_secs"),
            ));
        }

        Ok(())
    }

    fn validate_pool_config(config: &AppConfig) -> Result<()> {
        if config.pool.snapshot_path.as_os_str().is_empty() {
            return Err(AppError::config_validation(
                "Snapshot path cannot be empty",
                Some("pool.snapshot_path"),
            ));
        }

        if config.pool.preview_len == 0 {
            return Err(AppError::config_validation(
                "Preview length must be at least 1",
                Some("pool.preview_len"),
            ));
        }

        if config.seed_keys().is_empty() {
            debug!("No seed keys configured; pool relies on its snapshot or the update endpoint");
        }

        Ok(())
    }

    fn validate_url(url_str: &str, field_name: &str) -> Result<()> {
        let url = Url::parse(url_str).map_err(|e| {
            AppError::config_validation(
                format!("Invalid URL in {}: {} - {}", field_name, url_str, e),
                Some(field_name),
            )
        })?;

        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(AppError::config_validation(
                format!(
                    "Unsupported scheme '{}' in {}. Supported: http, https",
                    scheme, field_name
                ),
                Some(field_name),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[test]
    fn default_config_is_valid() {
        assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
    }

    #[rstest]
    #[case::zero_port(|c: &mut AppConfig| c.server.port = 0, "server.port")]
    #[case::zero_connect_timeout(|c: &mut AppConfig| c.server.connect_timeout_secs = 0, "server.connect_timeout_secs")]
    #[case::zero_request_timeout(|c: &mut AppConfig| c.server.request_timeout_secs = 0, "server.request_timeout_secs")]
    #[case::zero_attempts(|c: &mut AppConfig| c.retry.max_attempts = 0, "retry.max_attempts")]
    #[case::zero_preview(|c: &mut AppConfig| c.pool.preview_len = 0, "pool.preview_len")]
    #[case::empty_snapshot_path(|c: &mut AppConfig| c.pool.snapshot_path = PathBuf::new(), "pool.snapshot_path")]
    #[case::bad_url(|c: &mut AppConfig| c.upstream.target_url = "not a url".into(), "upstream.target_url")]
    #[case::bad_scheme(|c: &mut AppConfig| c.upstream.target_url = "ftp://example.com".into(), "upstream.target_url")]
    fn rejects_invalid_field(#[case] mutate: fn(&mut AppConfig), #[case] expected_field: &str) {
        let mut config = AppConfig::default();
        mutate(&mut config);
        match ConfigValidator::validate(&config) {
            Err(AppError::ConfigValidation { field, .. }) => {
                assert_eq!(field.as_deref(), Some(expected_field))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
