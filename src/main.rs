//! LegiSync server
//!
//! Main entry point: wires the sync services together, starts the cron
//! triggers and the background worker, and runs until interrupted.

use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use legisync_core::config::AppConfig;
use legisync_core::config::logging::LogFormat;
use legisync_core::error::AppError;
use legisync_service::SyncApp;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("LEGISYNC_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match std::env::var("LEGISYNC_CONFIG") {
        Ok(base) => AppConfig::load_from(&base, &env)?,
        Err(_) => AppConfig::load(&env)?,
    };
    config.validate()?;
    Ok(config)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting LegiSync v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Connections and services ─────────────────────────
    let app = SyncApp::build(config).await?;

    // ── Step 2: Migrations ───────────────────────────────────────
    app.migrate().await?;

    // ── Step 3: Cron triggers ────────────────────────────────────
    let mut triggers = app.start_triggers().await?;
    tracing::info!("LegiSync is running; press Ctrl+C to stop");

    // ── Step 4: Wait for shutdown signal ─────────────────────────
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");

    if let Err(e) = triggers.shutdown().await {
        tracing::warn!("Cron shutdown failed: {}", e);
    }
    app.shutdown().await;
    Ok(())
}
