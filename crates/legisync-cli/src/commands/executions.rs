//! Execution history commands.

use std::str::FromStr;
use std::sync::Arc;

use clap::{Args, Subcommand};

use crate::output::{self, ExecutionRow, OutputFormat};
use legisync_core::config::AppConfig;
use legisync_core::error::AppError;
use legisync_core::types::pagination::PageRequest;
use legisync_database::ExecutionStore;
use legisync_database::repositories::ExecutionRepository;
use legisync_entity::execution::{ExecutionKind, SchedulerType};
use uuid::Uuid;

/// Arguments for the executions command
#[derive(Debug, Args)]
pub struct ExecutionsArgs {
    /// Executions subcommand
    #[command(subcommand)]
    pub command: ExecutionsCommand,
}

/// Executions subcommands
#[derive(Debug, Subcommand)]
pub enum ExecutionsCommand {
    /// List executions, newest first
    List {
        /// Only this kind: backfill, daily, fast or manual
        #[arg(long)]
        kind: Option<String>,
        /// Page size
        #[arg(long, default_value = "25")]
        limit: u64,
        /// Items to skip
        #[arg(long, default_value = "0")]
        offset: u64,
    },
    /// Show one execution
    Show {
        /// Execution ID
        id: Uuid,
    },
}

/// Execute executions commands
pub async fn execute(
    args: &ExecutionsArgs,
    config: AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let pool = super::create_db_pool(&config).await?;
    let store: Arc<dyn ExecutionStore> = Arc::new(ExecutionRepository::new(pool.pool().clone()));

    match &args.command {
        ExecutionsCommand::List {
            kind,
            limit,
            offset,
        } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let page = store
                .list_executions(kind, &PageRequest::new(*limit, *offset))
                .await?;
            let rows: Vec<ExecutionRow> = page.items.iter().map(ExecutionRow::from).collect();
            output::print_list(&rows, format);
            if format == OutputFormat::Table && page.has_more {
                println!(
                    "Showing {}-{} of {}; use --offset {} for more.",
                    page.offset + 1,
                    page.offset + page.items.len() as u64,
                    page.total,
                    page.offset + page.limit
                );
            }
        }
        ExecutionsCommand::Show { id } => {
            let execution = store
                .get_execution(*id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("execution {id} not found")))?;
            output::print_execution(&execution, format);
        }
    }

    pool.close().await;
    Ok(())
}

fn parse_kind(s: &str) -> Result<ExecutionKind, AppError> {
    match s {
        "backfill" | "historical_backfill" => Ok(ExecutionKind::HistoricalBackfill),
        other => SchedulerType::from_str(other).map(|t| t.kind()),
    }
}
