//! Executes checkpointed backfill units in bounded batches.
//!
//! Within a checkpoint, items are sorted by natural key and written in
//! fixed-size batches strictly in order; after each durable batch the
//! checkpoint is rewritten with the new offset and the last written key. A
//! resumed checkpoint continues after the first item whose key sorts past
//! `last_processed_id`, so records added or removed upstream before that key
//! do not shift the resume point. Without a key it skips `processed_items`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use legisync_core::config::BackfillConfig;
use legisync_core::error::AppError;
use legisync_core::result::AppResult;
use legisync_database::{CheckpointStore, RecordRepository};
use legisync_entity::checkpoint::{Checkpoint, DataType};
use legisync_entity::execution::{BackfillRequest, SyncCounters};
use legisync_entity::record::{SyncRecord, sort_for_resume};

use super::planner::BackfillPlanner;
use crate::context::SyncContext;
use crate::progress::ProgressTracker;
use crate::sync::votes::year_window;
use crate::sync::{BillSync, ExpenseSync, LegislatorSync, VoteSync};

/// A checkpoint that ended `failed`.
#[derive(Debug, Clone, Serialize)]
pub struct FailedUnit {
    /// Checkpoint ID.
    pub checkpoint_id: Uuid,
    /// Unit label, e.g. `bills/2023`.
    pub unit: String,
    /// Failure reason.
    pub error: String,
}

/// Summary of one plan execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanReport {
    /// Unfinished checkpoints picked up from earlier runs.
    pub resumed: usize,
    /// Checkpoints created for this run.
    pub planned: usize,
    /// Units already completed by earlier runs.
    pub skipped: usize,
    /// Checkpoints completed by this run.
    pub completed: usize,
    /// Checkpoints failed by this run.
    pub failed: Vec<FailedUnit>,
    /// Items durably written by this run.
    pub items_written: u64,
}

impl PlanReport {
    /// Whether every checkpoint completed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Executes backfill plans.
#[derive(Debug, Clone)]
pub struct StrategicBackfillExecutor {
    checkpoints: Arc<dyn CheckpointStore>,
    planner: BackfillPlanner,
    ctx: Arc<SyncContext>,
    legislators: LegislatorSync,
    bills: BillSync,
    expenses: ExpenseSync,
    votes: VoteSync,
    batch_size: usize,
    max_retries: u32,
    retry_delay: Duration,
    batch_delay: Duration,
}

impl StrategicBackfillExecutor {
    /// Creates a new executor.
    pub fn new(ctx: Arc<SyncContext>, checkpoints: Arc<dyn CheckpointStore>, config: &BackfillConfig) -> Self {
        Self {
            planner: BackfillPlanner::new(Arc::clone(&checkpoints)),
            checkpoints,
            legislators: LegislatorSync::new(Arc::clone(&ctx)),
            bills: BillSync::new(Arc::clone(&ctx)),
            expenses: ExpenseSync::new(Arc::clone(&ctx)),
            votes: VoteSync::new(Arc::clone(&ctx)),
            ctx,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            batch_delay: config.batch_delay(),
        }
    }

    /// Plan `request` and execute every resulting checkpoint.
    ///
    /// A failed checkpoint is marked `failed` and the run moves on, except
    /// for the legislator roster: everything else depends on it, so its
    /// failure aborts the run. Cancellation stops between batches and
    /// leaves the current checkpoint `in_progress` for a later resume.
    pub async fn run(
        &self,
        request: &BackfillRequest,
        execution_id: Option<Uuid>,
        progress: Option<&ProgressTracker>,
        cancel: &CancellationToken,
    ) -> AppResult<PlanReport> {
        let plan = self.planner.plan(request, execution_id).await?;
        let mut report = PlanReport {
            resumed: plan.resumed.len(),
            planned: plan.created.len(),
            skipped: plan.skipped,
            ..PlanReport::default()
        };

        for mut checkpoint in plan.into_checkpoints() {
            if cancel.is_cancelled() {
                return Err(AppError::cancelled("backfill cancelled between checkpoints"));
            }

            self.checkpoints.mark_started(&mut checkpoint).await?;
            let unit = checkpoint.unit_label();
            info!(checkpoint_id = %checkpoint.id, unit = %unit, "Executing checkpoint");

            match self.execute_checkpoint(&mut checkpoint, progress, cancel).await {
                Ok(written) => {
                    self.checkpoints.mark_completed(&mut checkpoint).await?;
                    report.completed += 1;
                    report.items_written += written;
                    info!(checkpoint_id = %checkpoint.id, unit = %unit, written, "Checkpoint completed");
                }
                Err(e) if e.is_cancelled() => {
                    info!(
                        checkpoint_id = %checkpoint.id,
                        unit = %unit,
                        processed = checkpoint.progress.processed_items,
                        "Checkpoint interrupted; left in progress"
                    );
                    return Err(e);
                }
                Err(e) => {
                    error!(checkpoint_id = %checkpoint.id, unit = %unit, error = %e, "Checkpoint failed");
                    if let Err(mark_err) = self
                        .checkpoints
                        .mark_failed(&mut checkpoint, &e.to_string())
                        .await
                    {
                        warn!(checkpoint_id = %checkpoint.id, error = %mark_err, "Could not mark checkpoint failed");
                    }
                    if let Some(progress) = progress {
                        progress.record(|c| c.errors += 1).await;
                    }
                    report.failed.push(FailedUnit {
                        checkpoint_id: checkpoint.id,
                        unit: unit.clone(),
                        error: e.to_string(),
                    });

                    if checkpoint.data_type == DataType::Legislators {
                        return Err(AppError::new(
                            e.kind,
                            format!("legislator roster backfill failed: {}", e.message),
                        ));
                    }
                }
            }
        }

        Ok(report)
    }

    /// Fetch the item set of one checkpoint and write what remains of it.
    /// Returns the number of items written by this call.
    ///
    /// Leaves the checkpoint's status alone; the caller decides between
    /// `completed` and `failed`.
    pub async fn execute_checkpoint(
        &self,
        checkpoint: &mut Checkpoint,
        progress: Option<&ProgressTracker>,
        cancel: &CancellationToken,
    ) -> AppResult<u64> {
        match checkpoint.data_type {
            DataType::Legislators => {
                let items = self.legislators.fetch_all().await?;
                self.write_unit(checkpoint, items, self.ctx.legislators.as_ref(), progress, cancel)
                    .await
            }
            DataType::Bills => {
                let year = require_year(checkpoint)?;
                let items = self.bills.fetch_year(year, None).await?;
                self.write_unit(checkpoint, items, self.ctx.bills.as_ref(), progress, cancel)
                    .await
            }
            DataType::Expenses => {
                let year = require_year(checkpoint)?;
                let batch = self.expenses.fetch_year(year, None, cancel).await?;
                let incomplete = batch.incomplete_error();
                let written = self
                    .write_unit(checkpoint, batch.expenses, self.ctx.expenses.as_ref(), progress, cancel)
                    .await?;
                match incomplete {
                    Some(e) => Err(e),
                    None => Ok(written),
                }
            }
            DataType::Votes => {
                let year = require_year(checkpoint)?;
                let (start, end) = year_window(year, Utc::now().date_naive())
                    .ok_or_else(|| AppError::validation(format!("year {year} has no days to sync")))?;
                let items = self.votes.fetch_range(start, end).await?;
                self.write_unit(checkpoint, items, self.ctx.votes.as_ref(), progress, cancel)
                    .await
            }
        }
    }

    async fn write_unit<T: SyncRecord>(
        &self,
        checkpoint: &mut Checkpoint,
        mut items: Vec<T>,
        repo: &dyn RecordRepository<T>,
        progress: Option<&ProgressTracker>,
        cancel: &CancellationToken,
    ) -> AppResult<u64> {
        sort_for_resume(&mut items);
        let skip = match checkpoint.progress.last_processed_id.as_deref() {
            Some(last) => items.partition_point(|item| item.natural_key().as_str() <= last),
            None => usize::try_from(checkpoint.progress.processed_items)
                .unwrap_or(usize::MAX)
                .min(items.len()),
        };
        checkpoint.resume_at(skip as u64)?;
        checkpoint.record_total(items.len() as u64)?;
        self.checkpoints.update(checkpoint).await?;

        if skip > 0 {
            info!(
                checkpoint_id = %checkpoint.id,
                resume_from = skip,
                total = items.len(),
                last_processed_id = ?checkpoint.progress.last_processed_id,
                "Resuming checkpoint"
            );
        }

        let remaining = &items[skip..];
        let batches = remaining.len().div_ceil(self.batch_size);
        let mut written = 0u64;

        for (index, batch) in remaining.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(AppError::cancelled(format!(
                    "checkpoint {} cancelled before batch {}",
                    checkpoint.id,
                    index + 1
                )));
            }

            self.write_batch(checkpoint, batch, repo, cancel).await?;

            let count = batch.len() as u64;
            checkpoint.advance(count, batch.last().map(SyncRecord::natural_key))?;
            self.checkpoints.update(checkpoint).await?;
            written += count;
            debug!(
                checkpoint_id = %checkpoint.id,
                batch = index + 1,
                batches,
                processed = checkpoint.progress.processed_items,
                "Batch written"
            );

            if let Some(progress) = progress {
                progress.record(|c| add_items(c, T::DATA_TYPE, count)).await;
            }

            if index + 1 < batches && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        Ok(written)
    }

    /// Upsert one batch, retrying up to `max_retries` times with a
    /// linearly growing delay.
    async fn write_batch<T: SyncRecord>(
        &self,
        checkpoint: &mut Checkpoint,
        batch: &[T],
        repo: &dyn RecordRepository<T>,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let mut attempt = 0u32;
        loop {
            match repo.upsert(batch).await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_delay * attempt;
                    warn!(
                        checkpoint_id = %checkpoint.id,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Batch write failed; retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(AppError::cancelled(format!(
                                "checkpoint {} cancelled during batch retry",
                                checkpoint.id
                            )));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    checkpoint.record_failed_items(batch.len() as u64)?;
                    self.checkpoints.update(checkpoint).await?;
                    return Err(AppError::new(
                        e.kind,
                        format!(
                            "batch at offset {} failed after {} retries: {}",
                            checkpoint.progress.processed_items, self.max_retries, e.message
                        ),
                    ));
                }
            }
        }
    }
}

fn require_year(checkpoint: &Checkpoint) -> AppResult<i32> {
    checkpoint.metadata.year.ok_or_else(|| {
        AppError::validation(format!(
            "{} checkpoint {} has no year",
            checkpoint.data_type, checkpoint.id
        ))
    })
}

fn add_items(counters: &mut SyncCounters, data_type: DataType, count: u64) {
    match data_type {
        DataType::Legislators => counters.legislators += count,
        DataType::Bills => counters.bills += count,
        DataType::Expenses => counters.expenses += count,
        DataType::Votes => counters.votes += count,
    }
}
