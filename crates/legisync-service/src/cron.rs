//! Cron triggers for recurring scheduler runs and checkpoint retention.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;

use legisync_core::config::SchedulerConfig;
use legisync_core::error::AppError;
use legisync_entity::execution::{SchedulerRequest, SchedulerType};
use legisync_entity::job::{Job, JobPayload, JobPriority};
use legisync_worker::BackgroundJobProcessor;

use crate::scheduler::{SmartSchedulerService, schedule_for};

/// Cron-based triggers for the smart scheduler.
pub struct CronTriggers {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Scheduler service fired by the triggers
    service: SmartSchedulerService,
    /// Processor receiving retention jobs; `None` when the worker is disabled
    processor: Option<Arc<BackgroundJobProcessor>>,
}

impl std::fmt::Debug for CronTriggers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronTriggers").finish()
    }
}

impl CronTriggers {
    /// Create the trigger set.
    pub async fn new(
        service: SmartSchedulerService,
        processor: Option<Arc<BackgroundJobProcessor>>,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create cron scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            service,
            processor,
        })
    }

    /// Register the daily and fast scheduler triggers (when enabled) and
    /// the checkpoint retention trigger.
    pub async fn register(&self, config: &SchedulerConfig, retention_days: u32) -> Result<(), AppError> {
        for scheduler_type in [SchedulerType::Daily, SchedulerType::Fast] {
            let schedule = schedule_for(config, scheduler_type);
            match (&schedule.cron, schedule.enabled) {
                (Some(expr), true) => self.register_scheduler(scheduler_type, expr).await?,
                _ => tracing::info!("Skipped: scheduler_{} (disabled)", scheduler_type),
            }
        }
        match &self.processor {
            Some(processor) => {
                self.register_cleanup(Arc::clone(processor), &config.cleanup_cron, retention_days)
                    .await?
            }
            None => tracing::info!("Skipped: cleanup_checkpoints (worker disabled)"),
        }

        tracing::info!("All cron triggers registered");
        Ok(())
    }

    /// Start firing triggers
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start cron scheduler: {}", e)))?;

        tracing::info!("Cron triggers started");
        Ok(())
    }

    /// Stop firing triggers
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shut down cron scheduler: {}", e)))?;

        tracing::info!("Cron triggers shut down");
        Ok(())
    }

    async fn register_scheduler(&self, scheduler_type: SchedulerType, expr: &str) -> Result<(), AppError> {
        let service = self.service.clone();
        let job = CronJob::new_async(expr, move |_uuid, _lock| {
            let service = service.clone();
            Box::pin(async move {
                let request = SchedulerRequest::new(scheduler_type, "cron");
                match service.execute_intelligent_scheduler(request).await {
                    Ok(execution) => tracing::info!(
                        execution_id = %execution.execution_id,
                        "Cron started scheduler_{}",
                        scheduler_type
                    ),
                    Err(e) if e.is_already_running() || e.is_not_due() => {
                        tracing::info!("Cron skipped scheduler_{}: {}", scheduler_type, e.message)
                    }
                    Err(e) => tracing::error!("Cron failed to start scheduler_{}: {}", scheduler_type, e),
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid cron expression '{expr}' for scheduler_{scheduler_type}: {}",
                e
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add scheduler_{scheduler_type} trigger: {}", e))
        })?;

        tracing::info!("Registered: scheduler_{} ({})", scheduler_type, expr);
        Ok(())
    }

    async fn register_cleanup(
        &self,
        processor: Arc<BackgroundJobProcessor>,
        expr: &str,
        retention_days: u32,
    ) -> Result<(), AppError> {
        let job = CronJob::new_async(expr, move |_uuid, _lock| {
            let processor = Arc::clone(&processor);
            Box::pin(async move {
                tracing::debug!("Scheduling checkpoint cleanup job");
                let job = Job::new(
                    JobPayload::CleanupCheckpoints {
                        older_than_days: retention_days,
                    },
                    1,
                )
                .with_priority(JobPriority::Low);
                if let Err(e) = processor.submit(job) {
                    tracing::error!("Failed to enqueue cleanup_checkpoints: {}", e);
                }
            })
        })
        .map_err(|e| AppError::configuration(format!("Invalid cleanup cron expression '{expr}': {}", e)))?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add cleanup_checkpoints trigger: {}", e))
        })?;

        tracing::info!("Registered: cleanup_checkpoints ({})", expr);
        Ok(())
    }
}
