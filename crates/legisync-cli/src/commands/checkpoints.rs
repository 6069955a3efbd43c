//! Backfill checkpoint commands.

use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::{Args, Subcommand};

use crate::output::{self, CheckpointRow, OutputFormat};
use legisync_core::config::AppConfig;
use legisync_core::error::AppError;
use legisync_database::CheckpointStore;
use legisync_database::repositories::CheckpointRepository;

/// Arguments for the checkpoints command
#[derive(Debug, Args)]
pub struct CheckpointsArgs {
    /// Checkpoints subcommand
    #[command(subcommand)]
    pub command: CheckpointsCommand,
}

/// Checkpoints subcommands
#[derive(Debug, Subcommand)]
pub enum CheckpointsCommand {
    /// List pending and in-progress checkpoints in resume order
    Pending,
    /// Delete terminal checkpoints older than a number of days
    Cleanup {
        /// Age threshold in days (defaults to the configured retention)
        #[arg(long)]
        older_than_days: Option<u32>,
    },
}

/// Execute checkpoints commands
pub async fn execute(
    args: &CheckpointsArgs,
    config: AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let pool = super::create_db_pool(&config).await?;
    let store: Arc<dyn CheckpointStore> = Arc::new(CheckpointRepository::new(pool.pool().clone()));

    match &args.command {
        CheckpointsCommand::Pending => {
            let pending = store.list_pending().await?;
            let rows: Vec<CheckpointRow> = pending.iter().map(CheckpointRow::from).collect();
            output::print_list(&rows, format);
        }
        CheckpointsCommand::Cleanup { older_than_days } => {
            let days = older_than_days.unwrap_or(config.backfill.checkpoint_retention_days);
            if days == 0 {
                return Err(AppError::validation("--older-than-days must be at least 1"));
            }
            let cutoff = Utc::now() - Duration::days(i64::from(days));
            let deleted = store.delete_finished_before(cutoff).await?;
            output::print_success(&format!("Deleted {deleted} checkpoints older than {days} days."));
        }
    }

    pool.close().await;
    Ok(())
}
