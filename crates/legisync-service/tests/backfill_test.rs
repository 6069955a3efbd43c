//! Integration tests for the historical backfill.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::NaiveDate;

use common::{Harness, bill, vote};
use legisync_core::config::{CategoryToggles, WorkerConfig};
use legisync_core::traits::LockKey;
use legisync_database::CheckpointStore;
use legisync_entity::checkpoint::{CheckpointMetadata, CheckpointStatus, DataType};
use legisync_entity::execution::{BackfillRequest, ExecutionKind, ExecutionStatus};
use legisync_entity::record::SyncRecord;
use legisync_worker::{BackgroundJobProcessor, JobExecutor};

fn only(data_type: DataType) -> CategoryToggles {
    CategoryToggles {
        legislators: data_type == DataType::Legislators,
        bills: data_type == DataType::Bills,
        expenses: data_type == DataType::Expenses,
        votes: data_type == DataType::Votes,
    }
}

fn request(start: i32, end: i32, categories: CategoryToggles) -> BackfillRequest {
    BackfillRequest {
        categories,
        ..BackfillRequest::new(start, end, "test")
    }
}

#[tokio::test]
async fn test_completed_range_is_not_run_again() {
    let h = Harness::new();
    h.seed_roster(&[1, 2]);
    for year in 2022..=2024 {
        h.seed_bills(year, (year as i64 * 10)..=(year as i64 * 10 + 2));
    }
    let backfill = h.backfill();
    let req = BackfillRequest::new(2022, 2024, "test");

    let decision = backfill.should_run(&req).await.unwrap();
    assert!(decision.should_run);
    assert_eq!(decision.reason, "necessary");

    let execution = backfill.execute(req.clone()).await.unwrap();
    let finished = h.finish(execution.execution_id).await;
    assert_eq!(finished.status, ExecutionStatus::Success);
    assert_eq!(finished.counters.legislators, 2);
    assert_eq!(finished.counters.bills, 9);
    assert_eq!(finished.counters.years_processed, 3);

    let decision = backfill.should_run(&req).await.unwrap();
    assert!(!decision.should_run);
    assert!(decision.reason.starts_with("already done for 2022-2024 at "));

    // A sub-range is covered too.
    let sub = BackfillRequest::new(2023, 2024, "test");
    assert!(!backfill.should_run(&sub).await.unwrap().should_run);

    let err = backfill.execute(req.clone()).await.unwrap_err();
    assert!(err.is_not_due(), "unexpected error: {err}");
    assert_eq!(h.executions.of_kind(ExecutionKind::HistoricalBackfill).len(), 1);
    assert!(!h.lock.is_held(LockKey::backfill()));

    let forced = backfill.should_run(&req.forced()).await.unwrap();
    assert!(forced.should_run);
    assert_eq!(forced.reason, "forced re-execution");
}

#[tokio::test]
async fn test_interrupted_checkpoint_resumes_after_last_batch() {
    let h = Harness::new();
    h.seed_bills(2023, 1..=5);

    // A previous run wrote items 1 and 2, then died.
    let mut checkpoint = h
        .checkpoints
        .create(
            DataType::Bills,
            CheckpointMetadata {
                year: Some(2023),
                priority: DataType::Bills.priority(),
                execution_id: None,
            },
        )
        .await
        .unwrap();
    checkpoint.start().unwrap();
    checkpoint.record_total(5).unwrap();
    checkpoint
        .advance(2, Some(bill(2, 2023).natural_key()))
        .unwrap();
    h.checkpoints.update(&checkpoint).await.unwrap();

    let execution = h
        .backfill()
        .execute(request(2023, 2023, only(DataType::Bills)))
        .await
        .unwrap();
    let finished = h.finish(execution.execution_id).await;

    assert_eq!(finished.status, ExecutionStatus::Success);
    assert_eq!(finished.counters.bills, 3);
    let expected: Vec<String> = (3..=5).map(|id| bill(id, 2023).natural_key()).collect();
    assert_eq!(h.bills.written_keys(), expected);

    let resumed = h.checkpoints.get(checkpoint.id).await.unwrap();
    assert_eq!(resumed.status, CheckpointStatus::Completed);
    assert_eq!(resumed.progress.processed_items, 5);
    assert_eq!(resumed.progress.total_items, Some(5));
    assert_eq!(h.checkpoints.for_unit(DataType::Bills, Some(2023)).len(), 1);
}

#[tokio::test]
async fn test_failed_unit_retries_from_its_last_position() {
    let h = Harness::new();
    h.seed_bills(2023, 1..=5);

    // A previous run wrote items 1 and 2, then exhausted its retries.
    let mut failed = h
        .checkpoints
        .create(
            DataType::Bills,
            CheckpointMetadata {
                year: Some(2023),
                priority: DataType::Bills.priority(),
                execution_id: None,
            },
        )
        .await
        .unwrap();
    failed.start().unwrap();
    failed.record_total(5).unwrap();
    failed
        .advance(2, Some(bill(2, 2023).natural_key()))
        .unwrap();
    failed.record_failed_items(2).unwrap();
    failed.fail("upstream timeout").unwrap();
    h.checkpoints.update(&failed).await.unwrap();

    let execution = h
        .backfill()
        .execute(request(2023, 2023, only(DataType::Bills)))
        .await
        .unwrap();
    let finished = h.finish(execution.execution_id).await;

    assert_eq!(finished.status, ExecutionStatus::Success);
    assert_eq!(finished.counters.bills, 3);
    let expected: Vec<String> = (3..=5).map(|id| bill(id, 2023).natural_key()).collect();
    assert_eq!(h.bills.written_keys(), expected);

    let untouched = h.checkpoints.get(failed.id).await.unwrap();
    assert_eq!(untouched.status, CheckpointStatus::Failed);
    assert_eq!(untouched.progress.processed_items, 2);
    assert_eq!(untouched.progress.failed_items, 2);

    let units = h.checkpoints.for_unit(DataType::Bills, Some(2023));
    assert_eq!(units.len(), 2);
    let retry = units.iter().find(|cp| cp.id != failed.id).unwrap();
    assert_eq!(retry.status, CheckpointStatus::Completed);
    assert_eq!(retry.progress.processed_items, 5);
    assert_eq!(retry.progress.failed_items, 0);
}

#[tokio::test]
async fn test_resume_follows_last_key_when_upstream_shrinks() {
    let h = Harness::new();
    h.seed_bills(2023, 1..=5);

    // Items 1..=3 were written before the interruption.
    let mut checkpoint = h
        .checkpoints
        .create(
            DataType::Bills,
            CheckpointMetadata {
                year: Some(2023),
                priority: DataType::Bills.priority(),
                execution_id: None,
            },
        )
        .await
        .unwrap();
    checkpoint.start().unwrap();
    checkpoint.record_total(5).unwrap();
    checkpoint
        .advance(3, Some(bill(3, 2023).natural_key()))
        .unwrap();
    h.checkpoints.update(&checkpoint).await.unwrap();

    // Item 2 has since been withdrawn upstream.
    h.source.bills.lock().unwrap().retain(|b| b.id != 2);

    let execution = h
        .backfill()
        .execute(request(2023, 2023, only(DataType::Bills)))
        .await
        .unwrap();
    let finished = h.finish(execution.execution_id).await;

    assert_eq!(finished.status, ExecutionStatus::Success);
    let expected: Vec<String> = (4..=5).map(|id| bill(id, 2023).natural_key()).collect();
    assert_eq!(h.bills.written_keys(), expected);

    let resumed = h.checkpoints.get(checkpoint.id).await.unwrap();
    assert_eq!(resumed.status, CheckpointStatus::Completed);
    assert_eq!(resumed.progress.processed_items, 4);
    assert_eq!(resumed.progress.total_items, Some(4));
    assert_eq!(
        resumed.progress.last_processed_id,
        Some(bill(5, 2023).natural_key())
    );
}

#[tokio::test]
async fn test_forced_rerun_converges_to_same_state() {
    let h = Harness::new();
    h.seed_roster(&[1, 2, 3]);
    h.seed_bills(2022, 1..=5);
    let backfill = h.backfill();
    let categories = CategoryToggles {
        legislators: true,
        bills: true,
        expenses: false,
        votes: false,
    };

    let first = backfill
        .execute(request(2022, 2022, categories))
        .await
        .unwrap();
    h.finish(first.execution_id).await;
    let legislators = h.legislators.snapshot();
    let bills = h.bills.snapshot();

    let second = backfill
        .execute(request(2022, 2022, categories).forced())
        .await
        .unwrap();
    let second = h.finish(second.execution_id).await;

    assert_eq!(second.status, ExecutionStatus::Success);
    assert_eq!(second.counters.bills, 5);
    assert_eq!(h.legislators.snapshot(), legislators);
    assert_eq!(h.bills.snapshot(), bills);
    assert_eq!(h.checkpoints.all().len(), 4);
    assert!(
        h.checkpoints
            .all()
            .iter()
            .all(|cp| cp.status == CheckpointStatus::Completed)
    );
}

#[tokio::test]
async fn test_exhausted_batch_retries_fail_the_checkpoint() {
    let h = Harness::new();
    h.seed_bills(2023, 1..=3);
    h.bills.fail_every_write();

    let execution = h
        .backfill()
        .execute(request(2023, 2023, only(DataType::Bills)))
        .await
        .unwrap();
    let finished = h.finish(execution.execution_id).await;

    // One try plus two retries of the first batch.
    assert_eq!(h.bills.attempts(), 3);
    assert_eq!(finished.status, ExecutionStatus::Partial);
    assert_eq!(finished.counters.errors, 1);

    let checkpoint = h.checkpoints.for_unit(DataType::Bills, Some(2023)).remove(0);
    assert_eq!(checkpoint.status, CheckpointStatus::Failed);
    assert_eq!(checkpoint.progress.processed_items, 0);
    assert_eq!(checkpoint.progress.failed_items, 2);
    assert!(checkpoint.error_message.is_some());
    assert!(!h.lock.is_held(LockKey::backfill()));
}

#[tokio::test]
async fn test_follow_up_jobs_only_after_success() {
    let processor = Arc::new(BackgroundJobProcessor::start(
        &WorkerConfig::default(),
        Arc::new(JobExecutor::new()),
    ));

    let partial = Harness::new();
    partial.seed_bills(2023, 1..=3);
    partial.bills.fail_every_write();
    let execution = partial
        .backfill()
        .with_jobs(Arc::clone(&processor))
        .execute(request(2023, 2023, only(DataType::Bills)))
        .await
        .unwrap();
    let finished = partial.finish(execution.execution_id).await;
    assert_eq!(finished.status, ExecutionStatus::Partial);
    assert_eq!(processor.stats().submitted, 0);

    let clean = Harness::new();
    clean.seed_bills(2023, 1..=3);
    let execution = clean
        .backfill()
        .with_jobs(Arc::clone(&processor))
        .execute(request(2023, 2023, only(DataType::Bills)))
        .await
        .unwrap();
    let finished = clean.finish(execution.execution_id).await;
    assert_eq!(finished.status, ExecutionStatus::Success);
    assert!(processor.stats().submitted > 0);

    processor.shutdown().await;
}

#[tokio::test]
async fn test_roster_failure_aborts_the_run() {
    let h = Harness::new();
    h.seed_bills(2023, 1..=3);
    h.source.legislators_fail.store(true, Ordering::SeqCst);

    let execution = h
        .backfill()
        .execute(BackfillRequest::new(2023, 2023, "test"))
        .await
        .unwrap();
    let finished = h.finish(execution.execution_id).await;

    assert_eq!(finished.status, ExecutionStatus::Failed);
    assert!(
        finished
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("legislator roster backfill failed"))
    );
    assert_eq!(h.bills.attempts(), 0);
    let roster = h.checkpoints.for_unit(DataType::Legislators, None).remove(0);
    assert_eq!(roster.status, CheckpointStatus::Failed);
    assert!(!h.lock.is_held(LockKey::backfill()));
}

#[tokio::test]
async fn test_second_backfill_is_rejected_and_cancel_leaves_checkpoint_resumable() {
    let h = Harness::new();
    h.seed_roster(&[1, 2, 3]);
    h.source.hold();
    let backfill = h.backfill();

    let execution = backfill
        .execute(request(2023, 2023, only(DataType::Legislators)))
        .await
        .unwrap();

    let other_process = h.backfill();
    let err = other_process
        .execute(request(2023, 2023, only(DataType::Legislators)).forced())
        .await
        .unwrap_err();
    assert!(err.is_already_running(), "unexpected error: {err}");

    let decision = other_process
        .should_run(&request(2023, 2023, only(DataType::Legislators)))
        .await
        .unwrap();
    assert!(!decision.should_run);
    assert!(decision.reason.contains("already running"));

    let status = backfill.get_current_backfill_status().await.unwrap();
    assert!(status.is_running);

    assert!(backfill.cancel_backfill().await.unwrap());
    h.source.release();
    let finished = h.finish(execution.execution_id).await;

    assert_eq!(finished.status, ExecutionStatus::Failed);
    assert!(
        finished
            .error_message
            .as_deref()
            .is_some_and(|m| m.starts_with("cancelled"))
    );
    let roster = h.checkpoints.for_unit(DataType::Legislators, None).remove(0);
    assert!(roster.status.is_active());
    assert_eq!(roster.progress.processed_items, 0);

    let status = backfill.get_current_backfill_status().await.unwrap();
    assert!(!status.is_running);
    assert_eq!(status.pending_checkpoints.len(), 1);
    assert!(!h.lock.is_held(LockKey::backfill()));
}

#[tokio::test]
async fn test_vote_year_falls_back_to_single_days() {
    let h = Harness::new();
    let day = |m, d| NaiveDate::from_ymd_opt(2023, m, d).unwrap();
    h.source
        .votes
        .lock()
        .unwrap()
        .extend([vote("v-1", day(3, 14)), vote("v-2", day(11, 2))]);
    h.source.vote_ranges_time_out.store(true, Ordering::SeqCst);

    let execution = h
        .backfill()
        .execute(request(2023, 2023, only(DataType::Votes)))
        .await
        .unwrap();
    let finished = h.finish(execution.execution_id).await;

    assert_eq!(finished.status, ExecutionStatus::Success);
    assert_eq!(finished.counters.votes, 2);
    assert_eq!(finished.counters.years_processed, 1);
    assert_eq!(finished.counters.fallback_days, 365);
    assert!(h.checkpoints.all().is_empty());
}
