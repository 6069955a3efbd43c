//! CLI command definitions and dispatch.

pub mod backfill;
pub mod checkpoints;
pub mod executions;
pub mod migrate;
pub mod schedule;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::output::{self, OutputFormat};
use legisync_core::config::AppConfig;
use legisync_core::error::AppError;
use legisync_database::DatabasePool;
use legisync_entity::execution::Execution;
use legisync_service::SyncApp;

/// LegiSync: legislative open-data synchronization
#[derive(Debug, Parser)]
#[command(name = "legisync", version, about, long_about = None)]
pub struct Cli {
    /// Base configuration file, without extension
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Environment overlay (loads config/<env>.toml when present)
    #[arg(short, long, env = "LEGISYNC_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Historical backfill
    Backfill(backfill::BackfillArgs),
    /// Scheduler runs
    Schedule(schedule::ScheduleArgs),
    /// Run history
    Executions(executions::ExecutionsArgs),
    /// Backfill checkpoints
    Checkpoints(checkpoints::CheckpointsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(&self.config, &self.env)?;
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, config).await,
            Commands::Backfill(args) => backfill::execute(args, config, self.format).await,
            Commands::Schedule(args) => schedule::execute(args, config, self.format).await,
            Commands::Executions(args) => executions::execute(args, config, self.format).await,
            Commands::Checkpoints(args) => checkpoints::execute(args, config, self.format).await,
        }
    }
}

/// Helper: load and validate configuration
pub fn load_config(base: &str, env: &str) -> Result<AppConfig, AppError> {
    let config = AppConfig::load_from(base, env)?;
    config.validate()?;
    Ok(config)
}

/// Helper: connect to the database without building the services
pub async fn create_db_pool(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}

/// Helper: wait for a run started by this process, cancelling it on
/// Ctrl+C, and return its final record.
pub async fn wait_for_run(app: &SyncApp, execution_id: Uuid) -> Result<Execution, AppError> {
    println!("Execution {} started; press Ctrl+C to cancel.", execution_id);

    let tasks = Arc::clone(&app.tasks);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            output::print_warning("Cancelling...");
            tasks.cancel(execution_id);
        }
    });
    app.tasks.wait(execution_id).await;
    interrupt.abort();

    app.executions
        .get_execution(execution_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("execution {execution_id} disappeared")))
}
