//! Smart scheduler: recurring incremental syncs.
//!
//! Per scheduler type the life cycle is `idle -> running -> {success,
//! failed}`. A run starts only when the minimum interval since the last
//! run of the type has elapsed and the type's advisory lock was acquired.
//! Categories run in dependency order; the first failing category fails
//! the run and the remaining categories are skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use legisync_cache::keys;
use legisync_core::config::{BackfillConfig, CategoryToggles, SchedulerConfig};
use legisync_core::error::AppError;
use legisync_core::result::AppResult;
use legisync_core::traits::{AdvisoryLock, LockKey};
use legisync_core::types::pagination::{PageRequest, PageResponse};
use legisync_database::ExecutionStore;
use legisync_entity::execution::{
    Execution, ExecutionConfig, ExecutionStatus, SchedulerRequest, SchedulerType,
};
use legisync_entity::job::{CacheTarget, JobPayload, JobPriority};
use legisync_worker::BackgroundJobProcessor;

use super::cadence::{lookback_window, months_in_window, next_execution, schedule_for};
use super::status::SchedulerStatus;
use crate::context::SyncContext;
use crate::progress::ProgressTracker;
use crate::run::{RunLock, SideJobs, contain_panic, finalize, recover_abandoned};
use crate::sync::{BillSync, ExpenseSync, LegislatorSync, VoteSync};
use crate::tasks::TaskRegistry;

/// Orchestrates daily, fast, and manual incremental syncs.
#[derive(Debug, Clone)]
pub struct SmartSchedulerService {
    executions: Arc<dyn ExecutionStore>,
    lock: Arc<dyn AdvisoryLock>,
    legislators: LegislatorSync,
    bills: BillSync,
    expenses: ExpenseSync,
    votes: VoteSync,
    tasks: Arc<TaskRegistry>,
    jobs: SideJobs,
    config: SchedulerConfig,
    day_delay: Duration,
}

impl SmartSchedulerService {
    /// Creates a new scheduler service.
    pub fn new(
        ctx: Arc<SyncContext>,
        executions: Arc<dyn ExecutionStore>,
        lock: Arc<dyn AdvisoryLock>,
        tasks: Arc<TaskRegistry>,
        config: SchedulerConfig,
        backfill: &BackfillConfig,
    ) -> Self {
        Self {
            legislators: LegislatorSync::new(Arc::clone(&ctx)),
            bills: BillSync::new(Arc::clone(&ctx)),
            expenses: ExpenseSync::new(Arc::clone(&ctx)),
            votes: VoteSync::new(ctx),
            executions,
            lock,
            tasks,
            jobs: SideJobs::default(),
            config,
            day_delay: backfill.day_delay(),
        }
    }

    /// Hand post-run cache work to `processor`.
    pub fn with_jobs(mut self, processor: Arc<BackgroundJobProcessor>) -> Self {
        self.jobs = SideJobs::new(processor);
        self
    }

    /// Start a scheduler run in the background and return its running
    /// execution.
    ///
    /// Fails with `AlreadyRunning` when another session holds this type's
    /// lock, and with `NotDue` when the minimum interval has not elapsed
    /// (unless forced). Neither creates an execution record.
    pub async fn execute_intelligent_scheduler(&self, request: SchedulerRequest) -> AppResult<Execution> {
        let scheduler_type = request.scheduler_type;
        let categories = self.categories_for(&request)?;
        let lock = self.run_lock(scheduler_type);
        lock.acquire().await?;

        let execution = match self.prepare(&request).await {
            Ok(execution) => execution,
            Err(e) => {
                lock.release().await;
                return Err(e);
            }
        };

        info!(
            execution_id = %execution.execution_id,
            scheduler_type = %scheduler_type,
            force = request.force,
            triggered_by = %request.triggered_by,
            "Scheduler run started"
        );

        let service = self.clone();
        let snapshot = execution.clone();
        self.tasks.spawn(
            execution.execution_id,
            format!("scheduler_{scheduler_type}"),
            move |cancel| async move {
                service
                    .run(execution, scheduler_type, categories, lock, cancel)
                    .await
            },
        );
        Ok(snapshot)
    }

    /// Status of one scheduler type, or of all of them.
    pub async fn get_current_scheduler_status(
        &self,
        scheduler_type: Option<SchedulerType>,
    ) -> AppResult<Vec<SchedulerStatus>> {
        let types = match scheduler_type {
            Some(t) => vec![t],
            None => SchedulerType::ALL.to_vec(),
        };

        let mut statuses = Vec::with_capacity(types.len());
        for scheduler_type in types {
            let kind = scheduler_type.kind();
            let current = self.executions.get_running_execution(kind).await?;
            let last = self.executions.last_execution(kind).await?;
            let next_execution = self
                .executions
                .last_successful_execution(kind)
                .await?
                .and_then(|e| e.next_execution);
            statuses.push(SchedulerStatus {
                scheduler_type,
                is_running: current.is_some(),
                current,
                last,
                next_execution,
            });
        }
        Ok(statuses)
    }

    /// Cancel the running execution of a type. Returns `false` when nothing
    /// of that type is running in this process.
    pub async fn cancel_scheduler(&self, scheduler_type: SchedulerType) -> AppResult<bool> {
        let Some(running) = self
            .executions
            .get_running_execution(scheduler_type.kind())
            .await?
        else {
            return Ok(false);
        };
        let cancelled = self.tasks.cancel(running.execution_id);
        if !cancelled {
            warn!(
                execution_id = %running.execution_id,
                scheduler_type = %scheduler_type,
                "Running scheduler execution is owned by another process"
            );
        }
        Ok(cancelled)
    }

    /// Executions newest first, of one scheduler type or of every kind.
    pub async fn list_executions(
        &self,
        scheduler_type: Option<SchedulerType>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Execution>> {
        self.executions
            .list_executions(scheduler_type.map(|t| t.kind()), page)
            .await
    }

    fn run_lock(&self, scheduler_type: SchedulerType) -> RunLock {
        RunLock::new(
            Arc::clone(&self.lock),
            LockKey::scheduler(scheduler_type.as_str()),
            format!("scheduler '{scheduler_type}'"),
        )
    }

    fn categories_for(&self, request: &SchedulerRequest) -> AppResult<CategoryToggles> {
        let categories = request
            .categories
            .unwrap_or(schedule_for(&self.config, request.scheduler_type).categories);
        if !categories.any() {
            return Err(AppError::validation(format!(
                "scheduler '{}' has no enabled categories",
                request.scheduler_type
            )));
        }
        Ok(categories)
    }

    /// Runs under the lock: clear abandoned rows, check the interval, and
    /// record the new execution.
    async fn prepare(&self, request: &SchedulerRequest) -> AppResult<Execution> {
        let kind = request.scheduler_type.kind();
        recover_abandoned(self.executions.as_ref(), kind).await?;

        if !request.force {
            let schedule = schedule_for(&self.config, request.scheduler_type);
            let decision = self
                .executions
                .should_execute(kind, schedule.min_interval_hours)
                .await?;
            if !decision.should_run {
                return Err(AppError::not_due(format!(
                    "scheduler '{}' not due: {}",
                    request.scheduler_type, decision.reason
                )));
            }
        }

        let execution = Execution::start(
            kind,
            ExecutionConfig::Scheduler(request.clone()),
            request.triggered_by.clone(),
        );
        self.executions.create_execution(&execution).await?;
        Ok(execution)
    }

    async fn run(
        self,
        mut execution: Execution,
        scheduler_type: SchedulerType,
        categories: CategoryToggles,
        lock: RunLock,
        cancel: CancellationToken,
    ) {
        let tracker = ProgressTracker::new(execution.execution_id, Arc::clone(&self.executions));
        let result = contain_panic(self.sync_categories(scheduler_type, categories, &tracker, &cancel)).await;
        execution.counters = tracker.snapshot().await;

        match result {
            Ok(()) => {
                let schedule = schedule_for(&self.config, scheduler_type);
                let next = next_execution(scheduler_type, schedule, Utc::now());
                finalize(self.executions.as_ref(), &mut execution, ExecutionStatus::Success, None, next).await;
            }
            Err(e) => {
                finalize(
                    self.executions.as_ref(),
                    &mut execution,
                    ExecutionStatus::Failed,
                    Some(e.to_string()),
                    None,
                )
                .await;
            }
        }
        lock.release().await;

        if execution.status == ExecutionStatus::Success {
            self.submit_follow_up(categories);
        }
    }

    async fn sync_categories(
        &self,
        scheduler_type: SchedulerType,
        categories: CategoryToggles,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let schedule = schedule_for(&self.config, scheduler_type);
        let today = Utc::now().date_naive();
        let (since, until) = lookback_window(today, schedule.lookback_days);

        if categories.legislators {
            ensure_active(cancel)?;
            let written = self
                .legislators
                .sync()
                .await
                .map_err(|e| category_error("legislators", e))?;
            tracker.record(|c| c.legislators += written).await;
        }

        if categories.bills {
            for year in since.year()..=until.year() {
                ensure_active(cancel)?;
                let written = self
                    .bills
                    .sync(year, Some(since))
                    .await
                    .map_err(|e| category_error("bills", e))?;
                tracker.record(|c| c.bills += written).await;
            }
        }

        if categories.expenses {
            for (year, month) in months_in_window(since, until) {
                ensure_active(cancel)?;
                let written = self
                    .expenses
                    .sync(year, Some(month), cancel)
                    .await
                    .map_err(|e| category_error("expenses", e))?;
                tracker.record(|c| c.expenses += written).await;
            }
        }

        if categories.votes {
            ensure_active(cancel)?;
            let outcome = self
                .votes
                .sync_window(since, until, self.day_delay, cancel)
                .await
                .map_err(|e| category_error("votes", e))?;
            tracker
                .record(|c| {
                    c.votes += outcome.votes;
                    c.fallback_days += outcome.fallback_days;
                    c.errors += outcome.failed_days;
                })
                .await;
        }

        Ok(())
    }

    fn submit_follow_up(&self, categories: CategoryToggles) {
        let mut patterns = Vec::new();
        if categories.legislators {
            patterns.push(keys::legislators_pattern());
        }
        if categories.bills {
            patterns.push(keys::bills_pattern());
        }
        if categories.expenses {
            patterns.push(keys::expenses_pattern());
        }
        if categories.votes {
            patterns.push(keys::votes_pattern());
        }
        patterns.push(keys::analytics_pattern());
        self.jobs
            .submit(JobPayload::InvalidateCache { patterns }, 3, JobPriority::High);

        if categories.legislators {
            self.jobs.submit(
                JobPayload::WarmCache {
                    targets: vec![CacheTarget::LegislatorRoster],
                },
                3,
                JobPriority::Low,
            );
        }
    }
}

fn ensure_active(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        return Err(AppError::cancelled("scheduler run cancelled"));
    }
    Ok(())
}

fn category_error(category: &str, e: AppError) -> AppError {
    if e.is_cancelled() {
        return e;
    }
    AppError::new(e.kind, format!("{category} sync failed: {}", e.message))
}
