//! Historical backfill commands.

use clap::{Args, Subcommand};

use crate::output::{self, CheckpointRow, OutputFormat};
use legisync_core::config::{AppConfig, CategoryToggles};
use legisync_core::error::AppError;
use legisync_entity::execution::{BackfillRequest, ExecutionStatus};
use legisync_service::SyncApp;

/// Arguments for the backfill command
#[derive(Debug, Args)]
pub struct BackfillArgs {
    /// Backfill subcommand
    #[command(subcommand)]
    pub command: BackfillCommand,
}

/// Year range and category selection shared by `run` and `check`
#[derive(Debug, Args)]
pub struct RangeArgs {
    /// First year (defaults to the configured start year)
    #[arg(long)]
    pub start_year: Option<i32>,
    /// Last year (defaults to the configured end year, or the current year)
    #[arg(long)]
    pub end_year: Option<i32>,
    /// Re-run even if the range was already backfilled
    #[arg(long)]
    pub force: bool,
    /// Skip the legislator roster
    #[arg(long)]
    pub skip_legislators: bool,
    /// Skip bills
    #[arg(long)]
    pub skip_bills: bool,
    /// Skip expenses
    #[arg(long)]
    pub skip_expenses: bool,
    /// Skip votes
    #[arg(long)]
    pub skip_votes: bool,
}

/// Backfill subcommands
#[derive(Debug, Subcommand)]
pub enum BackfillCommand {
    /// Start a backfill and wait for it to finish
    Run(RangeArgs),
    /// Report whether a backfill over the range would run
    Check(RangeArgs),
    /// Show the running and last backfill and resumable checkpoints
    Status,
}

/// Execute backfill commands
pub async fn execute(
    args: &BackfillArgs,
    config: AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let app = SyncApp::build(config).await?;
    let result = dispatch(&app, &args.command, format).await;
    app.shutdown().await;
    result
}

async fn dispatch(
    app: &SyncApp,
    command: &BackfillCommand,
    format: OutputFormat,
) -> Result<(), AppError> {
    match command {
        BackfillCommand::Run(range) => {
            let request = build_request(app, range);
            let started = match app.backfill.execute(request).await {
                Ok(execution) => execution,
                Err(e) if e.is_not_due() || e.is_already_running() => {
                    output::print_warning(&e.message);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let finished = super::wait_for_run(app, started.execution_id).await?;
            output::print_execution(&finished, format);
            match finished.status {
                ExecutionStatus::Success => output::print_success("Backfill complete."),
                ExecutionStatus::Partial => {
                    output::print_warning("Backfill finished with failed units; re-run to resume.")
                }
                _ => output::print_error("Backfill failed."),
            }
        }
        BackfillCommand::Check(range) => {
            let request = build_request(app, range);
            let decision = app.backfill.should_run(&request).await?;
            match format {
                OutputFormat::Json => output::print_json(&decision),
                OutputFormat::Table => {
                    output::print_kv("Range", &format!("{}-{}", request.start_year, request.end_year));
                    output::print_kv("Should run", &decision.should_run.to_string());
                    output::print_kv("Reason", &decision.reason);
                }
            }
        }
        BackfillCommand::Status => {
            let status = app.backfill.get_current_backfill_status().await?;
            match format {
                OutputFormat::Json => output::print_json(&status),
                OutputFormat::Table => {
                    output::print_kv("Running", &status.is_running.to_string());
                    if let Some(current) = &status.current {
                        println!("\nCurrent:");
                        output::print_execution(current, format);
                    }
                    if let Some(last) = &status.last {
                        println!("\nLast:");
                        output::print_execution(last, format);
                    }
                    println!("\nPending checkpoints:");
                    let rows: Vec<CheckpointRow> =
                        status.pending_checkpoints.iter().map(CheckpointRow::from).collect();
                    output::print_list(&rows, format);
                }
            }
        }
    }
    Ok(())
}

fn build_request(app: &SyncApp, range: &RangeArgs) -> BackfillRequest {
    let mut request = app.backfill.default_request("cli");
    if let Some(start) = range.start_year {
        request.start_year = start;
    }
    if let Some(end) = range.end_year {
        request.end_year = end;
    }
    request.force = range.force;
    request.categories = CategoryToggles {
        legislators: !range.skip_legislators,
        bills: !range.skip_bills,
        expenses: !range.skip_expenses,
        votes: !range.skip_votes,
    };
    request
}
