//! Smart historical backfill.
//!
//! Decides whether a backfill of a year range is needed, then runs it in
//! the background: the checkpointed plan (roster, bills, expenses) first,
//! then votes with a small pool of year workers.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use legisync_cache::keys;
use legisync_core::config::BackfillConfig;
use legisync_core::error::AppError;
use legisync_core::result::AppResult;
use legisync_core::traits::{AdvisoryLock, LockKey};
use legisync_core::types::pagination::{PageRequest, PageResponse};
use legisync_database::{CheckpointStore, ExecutionStore};
use legisync_entity::execution::{
    BackfillRequest, Execution, ExecutionConfig, ExecutionKind, ExecutionStatus, ShouldRun,
};
use legisync_entity::job::{CacheTarget, JobPayload, JobPriority};
use legisync_worker::BackgroundJobProcessor;

use super::status::BackfillStatus;
use crate::context::SyncContext;
use crate::progress::ProgressTracker;
use crate::run::{RunLock, SideJobs, contain_panic, finalize, recover_abandoned};
use crate::strategic::{PlanReport, StrategicBackfillExecutor};
use crate::sync::VoteSync;
use crate::tasks::TaskRegistry;

/// What a backfill run achieved.
#[derive(Debug, Clone, Default)]
struct BackfillOutcome {
    plan: PlanReport,
    failed_vote_years: usize,
}

impl BackfillOutcome {
    fn is_clean(&self) -> bool {
        self.plan.is_clean() && self.failed_vote_years == 0
    }
}

/// Orchestrates historical backfills.
#[derive(Debug, Clone)]
pub struct SmartBackfillService {
    executions: Arc<dyn ExecutionStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    lock: RunLock,
    executor: StrategicBackfillExecutor,
    votes: VoteSync,
    tasks: Arc<TaskRegistry>,
    jobs: SideJobs,
    config: BackfillConfig,
}

impl SmartBackfillService {
    /// Creates a new backfill service.
    pub fn new(
        ctx: Arc<SyncContext>,
        executions: Arc<dyn ExecutionStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        lock: Arc<dyn AdvisoryLock>,
        tasks: Arc<TaskRegistry>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            executor: StrategicBackfillExecutor::new(Arc::clone(&ctx), Arc::clone(&checkpoints), &config),
            votes: VoteSync::new(ctx),
            lock: RunLock::new(lock, LockKey::backfill(), "historical backfill"),
            executions,
            checkpoints,
            tasks,
            jobs: SideJobs::default(),
            config,
        }
    }

    /// Hand post-run cache and analytics work to `processor`.
    pub fn with_jobs(mut self, processor: Arc<BackgroundJobProcessor>) -> Self {
        self.jobs = SideJobs::new(processor);
        self
    }

    /// A request over the configured default range.
    pub fn default_request(&self, triggered_by: impl Into<String>) -> BackfillRequest {
        let end = self
            .config
            .default_end_year
            .unwrap_or_else(|| Utc::now().year());
        BackfillRequest::new(self.config.default_start_year, end, triggered_by)
    }

    /// Decide whether `request` needs to run.
    ///
    /// Refused while a backfill is running, and when a successful backfill
    /// already covers the range (unless forced).
    pub async fn should_run(&self, request: &BackfillRequest) -> AppResult<ShouldRun> {
        self.validate(request)?;

        if let Some(running) = self
            .executions
            .get_running_execution(ExecutionKind::HistoricalBackfill)
            .await?
        {
            return Ok(ShouldRun::deny(format!(
                "a historical backfill is already running (execution {}, started {})",
                running.execution_id,
                running.started_at.to_rfc3339()
            )));
        }

        self.check_history(request).await
    }

    /// Start a backfill in the background and return its running execution.
    ///
    /// Fails with `AlreadyRunning` if another backfill holds the lock, and
    /// with `NotDue` if the range was already backfilled.
    pub async fn execute(&self, request: BackfillRequest) -> AppResult<Execution> {
        self.validate(&request)?;
        self.lock.acquire().await?;

        let execution = match self.prepare(&request).await {
            Ok(execution) => execution,
            Err(e) => {
                self.lock.release().await;
                return Err(e);
            }
        };

        info!(
            execution_id = %execution.execution_id,
            start_year = request.start_year,
            end_year = request.end_year,
            force = request.force,
            triggered_by = %request.triggered_by,
            "Historical backfill started"
        );

        let service = self.clone();
        let snapshot = execution.clone();
        self.tasks.spawn(
            execution.execution_id,
            "historical_backfill",
            move |cancel| async move { service.run(execution, request, cancel).await },
        );
        Ok(snapshot)
    }

    /// Current and last backfill executions plus resumable checkpoints.
    pub async fn get_current_backfill_status(&self) -> AppResult<BackfillStatus> {
        let current = self
            .executions
            .get_running_execution(ExecutionKind::HistoricalBackfill)
            .await?;
        let last = self
            .executions
            .last_execution(ExecutionKind::HistoricalBackfill)
            .await?;
        let pending_checkpoints = self.checkpoints.list_pending().await?;
        Ok(BackfillStatus {
            is_running: current.is_some(),
            current,
            last,
            pending_checkpoints,
        })
    }

    /// Cancel the running backfill. Returns `false` when nothing is running
    /// in this process.
    pub async fn cancel_backfill(&self) -> AppResult<bool> {
        let Some(running) = self
            .executions
            .get_running_execution(ExecutionKind::HistoricalBackfill)
            .await?
        else {
            return Ok(false);
        };
        let cancelled = self.tasks.cancel(running.execution_id);
        if !cancelled {
            warn!(
                execution_id = %running.execution_id,
                "Running backfill is owned by another process"
            );
        }
        Ok(cancelled)
    }

    /// Backfill executions, newest first.
    pub async fn list_executions(&self, page: &PageRequest) -> AppResult<PageResponse<Execution>> {
        self.executions
            .list_executions(Some(ExecutionKind::HistoricalBackfill), page)
            .await
    }

    fn validate(&self, request: &BackfillRequest) -> AppResult<()> {
        request.validate(self.config.min_year, Utc::now().year())
    }

    async fn check_history(&self, request: &BackfillRequest) -> AppResult<ShouldRun> {
        if request.force {
            return Ok(ShouldRun::allow("forced re-execution"));
        }
        let done = self
            .executions
            .find_successful_backfill(request.start_year, request.end_year)
            .await?;
        Ok(match done {
            Some(previous) => ShouldRun::deny(format!(
                "already done for {}-{} at {}",
                request.start_year,
                request.end_year,
                previous
                    .completed_at
                    .unwrap_or(previous.started_at)
                    .to_rfc3339()
            )),
            None => ShouldRun::allow("necessary"),
        })
    }

    /// Runs under the lock: clear abandoned rows, re-check history, and
    /// record the new execution.
    async fn prepare(&self, request: &BackfillRequest) -> AppResult<Execution> {
        recover_abandoned(self.executions.as_ref(), ExecutionKind::HistoricalBackfill).await?;

        let decision = self.check_history(request).await?;
        if !decision.should_run {
            return Err(AppError::not_due(decision.reason));
        }

        let execution = Execution::start(
            ExecutionKind::HistoricalBackfill,
            ExecutionConfig::Backfill(request.clone()),
            request.triggered_by.clone(),
        );
        self.executions.create_execution(&execution).await?;
        Ok(execution)
    }

    async fn run(self, mut execution: Execution, request: BackfillRequest, cancel: CancellationToken) {
        let tracker = ProgressTracker::new(execution.execution_id, Arc::clone(&self.executions));
        let result = contain_panic(self.backfill(&request, &execution, &tracker, &cancel)).await;
        execution.counters = tracker.snapshot().await;

        let (status, error_message) = match &result {
            Ok(outcome) if outcome.is_clean() => (ExecutionStatus::Success, None),
            Ok(outcome) => (
                ExecutionStatus::Partial,
                Some(format!(
                    "{} checkpoints and {} vote years failed",
                    outcome.plan.failed.len(),
                    outcome.failed_vote_years
                )),
            ),
            Err(e) if e.is_cancelled() => (ExecutionStatus::Failed, Some(format!("cancelled: {}", e.message))),
            Err(e) => (ExecutionStatus::Failed, Some(e.to_string())),
        };

        finalize(self.executions.as_ref(), &mut execution, status, error_message, None).await;
        self.lock.release().await;

        if status == ExecutionStatus::Success {
            self.submit_follow_up(&execution, &request);
        }
    }

    async fn backfill(
        &self,
        request: &BackfillRequest,
        execution: &Execution,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> AppResult<BackfillOutcome> {
        let plan = self
            .executor
            .run(request, Some(execution.execution_id), Some(tracker), cancel)
            .await?;

        let failed_vote_years = if request.categories.votes {
            self.sync_vote_years(request, tracker, cancel).await?
        } else {
            0
        };

        Ok(BackfillOutcome {
            plan,
            failed_vote_years,
        })
    }

    /// Drain the requested years with `vote_workers` concurrent workers.
    /// Each year falls back to day-by-day fetches on a gateway timeout; a
    /// year failing for any other reason is skipped. Returns the number of
    /// skipped years.
    async fn sync_vote_years(
        &self,
        request: &BackfillRequest,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) -> AppResult<usize> {
        let queue: Mutex<VecDeque<i32>> = Mutex::new(request.years().collect());
        let failed = Mutex::new(0usize);
        let day_delay = self.config.day_delay();

        let workers = (0..self.config.vote_workers.max(1))
            .map(|worker_id| self.vote_worker(worker_id, &queue, &failed, day_delay, tracker, cancel));
        futures::future::join_all(workers).await;

        if cancel.is_cancelled() {
            return Err(AppError::cancelled("vote backfill cancelled"));
        }
        Ok(*failed.lock().await)
    }

    async fn vote_worker(
        &self,
        worker_id: usize,
        queue: &Mutex<VecDeque<i32>>,
        failed: &Mutex<usize>,
        day_delay: Duration,
        tracker: &ProgressTracker,
        cancel: &CancellationToken,
    ) {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let Some(year) = queue.lock().await.pop_front() else {
                return;
            };

            match self.votes.sync_year(year, day_delay, cancel).await {
                Ok(outcome) => {
                    tracker
                        .record(|c| {
                            c.votes += outcome.votes;
                            c.years_processed += 1;
                            c.fallback_days += outcome.fallback_days;
                            c.errors += outcome.failed_days;
                        })
                        .await;
                }
                Err(e) if e.is_cancelled() => return,
                Err(e) => {
                    warn!(worker_id, year, error = %e, "Vote year failed; skipping");
                    *failed.lock().await += 1;
                    tracker.record(|c| c.errors += 1).await;
                }
            }
        }
    }

    fn submit_follow_up(&self, execution: &Execution, request: &BackfillRequest) {
        // Fire and forget: analytics staleness is tolerated, so no retries.
        self.jobs.submit(
            JobPayload::RefreshAnalytics {
                execution_id: execution.execution_id,
            },
            0,
            JobPriority::Normal,
        );

        let mut patterns = Vec::new();
        if request.categories.legislators {
            patterns.push(keys::legislators_pattern());
        }
        if request.categories.bills {
            patterns.push(keys::bills_pattern());
        }
        if request.categories.expenses {
            patterns.push(keys::expenses_pattern());
        }
        if request.categories.votes {
            patterns.push(keys::votes_pattern());
        }
        self.jobs.submit(
            JobPayload::InvalidateCache { patterns },
            3,
            JobPriority::High,
        );
        self.jobs.submit(
            JobPayload::WarmCache {
                targets: vec![CacheTarget::LegislatorRoster],
            },
            3,
            JobPriority::Low,
        );
    }
}
