//! Bounded in-process job processor.
//!
//! Jobs enter one of two bounded lanes: `high`/`critical` jobs go to the
//! expedited lane, which workers always drain first. A fixed pool of workers
//! executes jobs under a per-job timeout. Failed jobs are resubmitted after
//! an exponential backoff until their retry budget is spent.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender, error::SendTimeoutError, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use legisync_core::config::WorkerConfig;
use legisync_core::error::AppError;
use legisync_core::result::AppResult;
use legisync_entity::job::{Job, JobPayload};

use crate::backoff::Backoff;
use crate::executor::{JobExecutionError, JobExecutor};

/// Lifetime counters of a processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Jobs accepted by `submit`/`submit_async` (excluding resubmissions).
    pub submitted: u64,
    /// Submissions refused because the lane was full.
    pub rejected: u64,
    /// Executions that ended successfully.
    pub completed: u64,
    /// Resubmissions scheduled after a failure.
    pub retried: u64,
    /// Jobs dropped after a permanent error or an exhausted retry budget.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

/// State shared by workers and retry tasks.
#[derive(Debug)]
struct Shared {
    executor: Arc<JobExecutor>,
    backoff: Backoff,
    job_timeout: Duration,
    expedited_tx: Sender<Job>,
    default_tx: Sender<Job>,
    counters: Counters,
    cancel: CancellationToken,
    retries: TaskTracker,
}

impl Shared {
    fn lane(&self, job: &Job) -> &Sender<Job> {
        if job.priority.is_expedited() {
            &self.expedited_tx
        } else {
            &self.default_tx
        }
    }
}

/// Fixed-size worker pool fed by bounded queues.
#[derive(Debug)]
pub struct BackgroundJobProcessor {
    shared: Arc<Shared>,
    workers: TaskTracker,
    default_max_retries: u32,
    submit_timeout: Duration,
    shutdown_grace: Duration,
}

impl BackgroundJobProcessor {
    /// Create the queues and spawn `config.concurrency` workers.
    pub fn start(config: &WorkerConfig, executor: Arc<JobExecutor>) -> Self {
        let capacity = config.queue_size.max(1);
        let (expedited_tx, expedited_rx) = mpsc::channel(capacity);
        let (default_tx, default_rx) = mpsc::channel(capacity);

        let shared = Arc::new(Shared {
            executor,
            backoff: Backoff::from_config(config),
            job_timeout: config.job_timeout(),
            expedited_tx,
            default_tx,
            counters: Counters::default(),
            cancel: CancellationToken::new(),
            retries: TaskTracker::new(),
        });

        let expedited_rx = Arc::new(Mutex::new(expedited_rx));
        let default_rx = Arc::new(Mutex::new(default_rx));
        let workers = TaskTracker::new();
        let concurrency = config.concurrency.max(1);
        for worker_id in 0..concurrency {
            workers.spawn(worker_loop(
                worker_id,
                Arc::clone(&shared),
                Arc::clone(&expedited_rx),
                Arc::clone(&default_rx),
            ));
        }
        workers.close();

        info!(
            concurrency,
            queue_size = capacity,
            job_timeout_secs = config.job_timeout_seconds,
            "Background job processor started"
        );

        Self {
            shared,
            workers,
            default_max_retries: config.default_max_retries,
            submit_timeout: Duration::from_secs(config.submit_timeout_seconds),
            shutdown_grace: Duration::from_secs(config.shutdown_grace_seconds),
        }
    }

    /// Queue a job without waiting. Fails with `QueueFull` when its lane is
    /// at capacity.
    pub fn submit(&self, job: Job) -> AppResult<()> {
        if self.shared.cancel.is_cancelled() {
            return Err(AppError::internal("Job processor is shut down"));
        }
        let job_id = job.id;
        let kind = job.kind();
        match self.shared.lane(&job).try_send(job) {
            Ok(()) => {
                self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(%job_id, job_kind = %kind, "Job submitted");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(%job_id, job_kind = %kind, "Job queue full; rejecting job");
                Err(AppError::queue_full(format!("Job queue full; {kind} job {job_id} rejected")))
            }
            Err(TrySendError::Closed(_)) => Err(AppError::internal("Job processor is shut down")),
        }
    }

    /// Queue a job, waiting up to the configured submit timeout for space.
    pub async fn submit_async(&self, job: Job) -> AppResult<()> {
        if self.shared.cancel.is_cancelled() {
            return Err(AppError::internal("Job processor is shut down"));
        }
        let job_id = job.id;
        let kind = job.kind();
        match self.shared.lane(&job).send_timeout(job, self.submit_timeout).await {
            Ok(()) => {
                self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(%job_id, job_kind = %kind, "Job submitted");
                Ok(())
            }
            Err(SendTimeoutError::Timeout(_)) => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(%job_id, job_kind = %kind, "Job queue stayed full; rejecting job");
                Err(AppError::queue_full(format!(
                    "Job queue full for {:?}; {kind} job {job_id} rejected",
                    self.submit_timeout
                )))
            }
            Err(SendTimeoutError::Closed(_)) => Err(AppError::internal("Job processor is shut down")),
        }
    }

    /// Build a normal-priority job with the default retry budget and submit it.
    pub fn enqueue(&self, payload: JobPayload) -> AppResult<Job> {
        let job = Job::new(payload, self.default_max_retries);
        self.submit(job.clone())?;
        Ok(job)
    }

    /// Current counters.
    pub fn stats(&self) -> ProcessorStats {
        let c = &self.shared.counters;
        ProcessorStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }

    /// Jobs waiting in both lanes.
    pub fn queued(&self) -> usize {
        let depth = |tx: &Sender<Job>| tx.max_capacity() - tx.capacity();
        depth(&self.shared.expedited_tx) + depth(&self.shared.default_tx)
    }

    /// Stop taking jobs, let in-flight jobs finish within the grace period,
    /// and drop queued jobs and pending retries.
    pub async fn shutdown(&self) {
        let queued = self.queued();
        info!(queued, "Shutting down job processor");
        self.shared.cancel.cancel();
        self.shared.retries.close();

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            self.workers.wait().await;
            self.shared.retries.wait().await;
        })
        .await;

        match drained {
            Ok(()) => info!("Job processor shut down"),
            Err(_) => warn!(
                grace_secs = self.shutdown_grace.as_secs(),
                "Job processor grace period elapsed with jobs still running"
            ),
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    shared: Arc<Shared>,
    expedited_rx: Arc<Mutex<Receiver<Job>>>,
    default_rx: Arc<Mutex<Receiver<Job>>>,
) {
    debug!(worker_id, "Worker started");
    loop {
        let job = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            Some(job) = recv(&expedited_rx) => job,
            Some(job) = recv(&default_rx) => job,
            else => break,
        };
        run_job(worker_id, &shared, job).await;
    }
    debug!(worker_id, "Worker stopped");
}

async fn recv(rx: &Mutex<Receiver<Job>>) -> Option<Job> {
    rx.lock().await.recv().await
}

async fn run_job(worker_id: usize, shared: &Arc<Shared>, mut job: Job) {
    job.started_at = Some(Utc::now());

    let guarded = AssertUnwindSafe(shared.executor.execute(&job)).catch_unwind();
    let result: Result<Option<Value>, JobExecutionError> =
        match tokio::time::timeout(shared.job_timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(JobExecutionError::Transient(format!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(JobExecutionError::Transient(format!(
                "timed out after {}s",
                shared.job_timeout.as_secs()
            ))),
        };

    match result {
        Ok(_) => {
            job.done_at = Some(Utc::now());
            shared.counters.completed.fetch_add(1, Ordering::Relaxed);
            info!(worker_id, job_id = %job.id, job_kind = %job.kind(), attempt = job.attempt(), "Job completed");
        }
        Err(e) if !e.is_retryable() => {
            shared.counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(worker_id, job_id = %job.id, job_kind = %job.kind(), error = %e, "Job failed permanently");
        }
        Err(e) => {
            job.last_error = Some(e.to_string());
            if !job.can_retry() {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    worker_id,
                    job_id = %job.id,
                    job_kind = %job.kind(),
                    attempts = job.attempt(),
                    error = %e,
                    "Job failed: max retries exceeded"
                );
                return;
            }

            let delay = shared.backoff.delay(job.retries);
            job.retries += 1;
            shared.counters.retried.fetch_add(1, Ordering::Relaxed);
            warn!(
                worker_id,
                job_id = %job.id,
                job_kind = %job.kind(),
                attempt = job.retries,
                max_retries = job.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "Job failed; scheduling retry"
            );
            schedule_retry(shared, job, delay);
        }
    }
}

fn schedule_retry(shared: &Arc<Shared>, mut job: Job, delay: Duration) {
    let shared_for_task = Arc::clone(shared);
    shared.retries.spawn(async move {
        let shared = shared_for_task;
        tokio::select! {
            _ = shared.cancel.cancelled() => {
                warn!(job_id = %job.id, "Shutdown during backoff; retry dropped");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        job.started_at = None;
        let job_id = job.id;
        // Resubmissions wait for space instead of failing: the job was
        // already accepted once.
        let lane = shared.lane(&job).clone();
        tokio::select! {
            _ = shared.cancel.cancelled() => {
                warn!(%job_id, "Shutdown while resubmitting; retry dropped");
            }
            sent = lane.send(job) => {
                if sent.is_err() {
                    warn!(%job_id, "Job processor closed; retry dropped");
                }
            }
        }
    });
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
