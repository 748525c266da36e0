//! tis-ingest - Transcript Intake Service
//!
//! Accepts transcript uploads (scans or CSV), structures them into degree and
//! course records, pauses files with ambiguous courses for human review, and
//! stores the results for search.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tis_common::config::{CliOverrides, ServiceConfig};
use tis_common::events::EventBus;
use tis_ingest::AppState;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "tis-ingest", version, about = "Transcript intake service")]
struct Cli {
    /// Path to TOML config file
    #[arg(long, env = "TIS_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP bind address, e.g. 127.0.0.1:5740
    #[arg(long)]
    bind: Option<String>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ServiceConfig::resolve(&CliOverrides {
        config_path: cli.config,
        bind_address: cli.bind,
        database_path: cli.database,
    })
    .context("Failed to resolve configuration")?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.logging.level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting tis-ingest (Transcript Intake) service");
    info!(
        "Version: {} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    config
        .ensure_directories()
        .context("Failed to create data directories")?;

    info!("Database: {}", config.database_path.display());
    let db_pool = tis_ingest::db::init_database_pool(&config.database_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    let components = tis_ingest::build_components(&config)?;
    info!(categories = components.categories.len(), "Course categories loaded");

    let orchestrator = tis_ingest::build_orchestrator(db_pool.clone(), event_bus.clone(), components, &config);

    let bind_address = config.bind_address.clone();
    let state = AppState::new(db_pool, event_bus, Arc::new(orchestrator), config);
    let app = tis_ingest::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
