//! Berth server binary.

use anyhow::{Context, Result};
use berth_core::config::AppConfig;
use berth_server::{AppState, LogNotifier, create_router};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Berth - a resumable upload server
#[derive(Parser, Debug)]
#[command(name = "berthd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "BERTH_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Berth v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("BERTH_") && key != "BERTH_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: berthd --config /path/to/config.toml\n  \
             2. Environment variables: BERTH_STORAGE__TYPE=filesystem \
             BERTH_STORAGE__PATH=/var/lib/berth/containers \
             BERTH_METADATA__TYPE=filesystem \
             BERTH_METADATA__PATH=/var/lib/berth/records berthd\n\n\
             See config/server.example.toml for example configuration."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("BERTH_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .server
        .validate()
        .context("invalid server configuration")?;

    berth_server::metrics::register_metrics();

    // Initialize the content store and verify it before accepting requests
    let content = berth_storage::from_config(&config.storage)
        .await
        .context("failed to initialize content store")?;
    content
        .health_check()
        .await
        .context("content store health check failed")?;
    tracing::info!(backend = content.backend_name(), "Content store initialized");

    let records = berth_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize record store")?;
    records
        .health_check()
        .await
        .context("record store health check failed")?;
    tracing::info!("Record store initialized");

    let state = AppState::new(config.clone(), records, content, Arc::new(LogNotifier));
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
