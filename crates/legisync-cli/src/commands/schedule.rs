//! Scheduler commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use legisync_core::config::AppConfig;
use legisync_core::error::AppError;
use legisync_entity::execution::{SchedulerRequest, SchedulerType};
use legisync_service::SyncApp;

/// Arguments for the schedule command
#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Schedule subcommand
    #[command(subcommand)]
    pub command: ScheduleCommand,
}

/// Schedule subcommands
#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// Run one scheduler type now and wait for it to finish
    Run {
        /// Scheduler type: daily, fast or manual
        #[arg(default_value = "manual")]
        scheduler_type: SchedulerType,
        /// Ignore the minimum interval
        #[arg(long)]
        force: bool,
    },
    /// Show running, last and next runs
    Status {
        /// Scheduler type (all types when omitted)
        scheduler_type: Option<SchedulerType>,
    },
}

/// Execute schedule commands
pub async fn execute(
    args: &ScheduleArgs,
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
    command: &ScheduleCommand,
    format: OutputFormat,
) -> Result<(), AppError> {
    match command {
        ScheduleCommand::Run {
            scheduler_type,
            force,
        } => {
            let mut request = SchedulerRequest::new(*scheduler_type, "cli");
            request.force = *force;
            let started = match app.scheduler.execute_intelligent_scheduler(request).await {
                Ok(execution) => execution,
                Err(e) if e.is_not_due() || e.is_already_running() => {
                    output::print_warning(&e.message);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let finished = super::wait_for_run(app, started.execution_id).await?;
            output::print_execution(&finished, format);
        }
        ScheduleCommand::Status { scheduler_type } => {
            let statuses = app
                .scheduler
                .get_current_scheduler_status(*scheduler_type)
                .await?;
            match format {
                OutputFormat::Json => output::print_json(&statuses),
                OutputFormat::Table => {
                    for status in &statuses {
                        println!("{}:", status.scheduler_type);
                        output::print_kv("Running", &status.is_running.to_string());
                        if let Some(last) = &status.last {
                            output::print_kv(
                                "Last run",
                                &format!("{} ({})", last.started_at.to_rfc3339(), last.status),
                            );
                        }
                        let next = status
                            .next_execution
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "now".to_string());
                        output::print_kv("Next eligible", &next);
                    }
                }
            }
        }
    }
    Ok(())
}
