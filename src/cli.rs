// src/cli.rs

use crate::config::{self, AppConfig};
use crate::error::Result;
use crate::pool::{mask_key, PoolState, PoolStatus};
use crate::storage::{FileStore, Persistence};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "gemini-key-pool",
    version,
    about = "Gemini API key pool with rate-limit aware rotation",
    long_about = "Serves a pool of interchangeable Gemini API keys. Upstream calls use the current key; rate-limit and overload answers rotate to the next key and retry. Pool state is persisted to a JSON snapshot and survives restarts."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "KEY_POOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server bind address (overrides the configuration)
    #[arg(long)]
    pub host: Option<String>,

    /// Server port (overrides the configuration)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log filter, e.g. `info` or `gemini_key_pool=debug`
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, env = "KEY_POOL_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the server (default)
    Serve,

    /// Validate configuration file
    Config {
        /// Configuration file to validate
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Show detailed validation output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the pool status stored in a snapshot file
    Status {
        /// Snapshot file (defaults to the configured path)
        #[arg(short, long, value_name = "FILE")]
        snapshot: Option<PathBuf>,
    },
}

impl Cli {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }

    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

/// Load and validate a configuration file, returning a printable summary.
pub fn validate_config_file(path: &Path, verbose: bool) -> Result<String> {
    let config = config::load_config(path)?;
    let mut summary = format!(
        "Configuration valid: {}\n  server: {}:{}\n  snapshot: {}\n  seed keys: {}\n  max attempts: {}\n",
        path.display(),
        config.server.host,
        config.server.port,
        config.pool.snapshot_path.display(),
        config.seed_keys().len(),
        config.retry.max_attempts,
    );
    if verbose {
        summary.push_str(&format!(
            "  upstream: {}\n  admin token: {}\n  backoff: {}ms\n",
            config.upstream.target_url,
            if config.server.admin_token.is_some() { "set" } else { "not set" },
            config.retry.backoff_ms,
        ));
        for key in config.seed_keys() {
            summary.push_str(&format!("  key: {}\n", mask_key(&key, config.pool.preview_len)));
        }
    }
    Ok(summary)
}

/// Read a snapshot without starting the server. A missing file reads as an
/// empty pool.
pub fn snapshot_status(path: &Path, preview_len: usize) -> Result<PoolStatus> {
    let state = FileStore::new(path)
        .load()?
        .map(PoolState::from_snapshot)
        .unwrap_or_default();
    Ok(PoolStatus::from_state(&state, preview_len))
}
