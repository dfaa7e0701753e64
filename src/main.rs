// src/main.rs

use anyhow::Context;
use axum::serve;
use clap::Parser;
use gemini_key_pool::{
    build_state,
    cli::{self, Cli, Commands},
    config, create_router, metrics,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!(signal = "Ctrl+C", "Received signal. Initiating graceful shutdown...") },
        () = terminate => { info!(signal = "Terminate", "Received signal. Initiating graceful shutdown...") },
    }
}

fn init_tracing(cli: &Cli) {
    let env_filter = cli
        .log_level
        .as_deref()
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);
    let config_path = config::resolve_config_path(cli.config.as_deref());

    match cli.command() {
        Commands::Config { file, verbose } => {
            let path = file.unwrap_or(config_path);
            let summary = cli::validate_config_file(&path, verbose)
                .with_context(|| format!("invalid configuration in {}", path.display()))?;
            print!("{summary}");
            Ok(())
        }
        Commands::Status { snapshot } => {
            let app_config = config::load_config(&config_path)?;
            let path = snapshot.unwrap_or(app_config.pool.snapshot_path);
            let status = cli::snapshot_status(&path, app_config.pool.preview_len)
                .with_context(|| format!("failed to read snapshot {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Commands::Serve => serve_forever(&cli, &config_path).await,
    }
}

async fn serve_forever(cli: &Cli, config_path: &std::path::Path) -> anyhow::Result<()> {
    info!("Starting Gemini key pool server...");

    let handle = metrics::install_recorder();
    if handle.is_none() {
        warn!("Metrics endpoint disabled");
    }

    let state = build_state(config_path, |config| cli.apply_overrides(config))
        .context("application setup failed")?
        .with_metrics(handle);

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                state.config.server.host, state.config.server.port
            )
        })?;

    let app = create_router(Arc::new(state));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!(server.address = %addr, error = ?e, "Failed to bind to address. Exiting.");
        e
    })?;
    info!(server.address = %addr, "Server listening");

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server run loop failed")?;

    info!("Server shut down gracefully.");
    Ok(())
}
