//! Integration tests for the smart scheduler.

mod common;

use std::sync::atomic::Ordering;

use chrono::{Datelike, Duration, Utc};

use common::{Harness, vote};
use legisync_core::config::CategoryToggles;
use legisync_core::traits::LockKey;
use legisync_entity::execution::{
    Execution, ExecutionConfig, ExecutionKind, ExecutionStatus, SchedulerRequest, SchedulerType,
};
use legisync_service::run::ABANDONED;

fn manual(force: bool) -> SchedulerRequest {
    SchedulerRequest {
        force,
        ..SchedulerRequest::new(SchedulerType::Manual, "test")
    }
}

fn votes_only() -> CategoryToggles {
    CategoryToggles {
        legislators: false,
        bills: false,
        expenses: false,
        votes: true,
    }
}

#[tokio::test]
async fn test_concurrent_triggers_start_exactly_one_run() {
    let h = Harness::new();
    h.seed_roster(&[1, 2]);
    h.source.hold();

    // Eight "processes" sharing one database and lock table.
    let services: Vec<_> = (0..8).map(|_| h.scheduler()).collect();
    let results =
        futures::future::join_all(services.iter().map(|s| s.execute_intelligent_scheduler(manual(true)))).await;

    let started: Vec<&Execution> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(started.len(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(err.is_already_running(), "unexpected error: {err}");
    }
    assert_eq!(h.executions.of_kind(ExecutionKind::SchedulerManual).len(), 1);

    let execution_id = started[0].execution_id;
    h.source.release();
    let finished = h.finish(execution_id).await;

    assert_eq!(finished.status, ExecutionStatus::Success);
    assert!(!h.lock.is_held(LockKey::scheduler("manual")));
}

#[tokio::test]
async fn test_run_is_not_due_within_minimum_interval() {
    let h = Harness::new();
    h.seed_roster(&[1]);
    let scheduler = h.scheduler();

    let first = scheduler
        .execute_intelligent_scheduler(SchedulerRequest::new(SchedulerType::Daily, "cron"))
        .await
        .unwrap();
    let first = h.finish(first.execution_id).await;
    assert_eq!(first.status, ExecutionStatus::Success);
    assert_eq!(first.counters.legislators, 1);
    assert!(first.next_execution.is_some());

    let err = scheduler
        .execute_intelligent_scheduler(SchedulerRequest::new(SchedulerType::Daily, "cron"))
        .await
        .unwrap_err();
    assert!(err.is_not_due(), "unexpected error: {err}");
    assert!(err.message.contains("not due"));
    assert_eq!(h.executions.of_kind(ExecutionKind::SchedulerDaily).len(), 1);
    assert!(!h.lock.is_held(LockKey::scheduler("daily")));

    let statuses = scheduler
        .get_current_scheduler_status(Some(SchedulerType::Daily))
        .await
        .unwrap();
    assert_eq!(statuses.len(), 1);
    assert!(!statuses[0].is_running);
    assert_eq!(statuses[0].next_execution, first.next_execution);

    let forced = scheduler
        .execute_intelligent_scheduler(SchedulerRequest {
            force: true,
            ..SchedulerRequest::new(SchedulerType::Daily, "cli")
        })
        .await
        .unwrap();
    h.finish(forced.execution_id).await;
    assert_eq!(h.executions.of_kind(ExecutionKind::SchedulerDaily).len(), 2);
}

#[tokio::test]
async fn test_vote_window_falls_back_to_single_days() {
    let h = Harness::new();
    let today = Utc::now().date_naive();
    let since = today - Duration::days(2);
    h.source
        .votes
        .lock()
        .unwrap()
        .extend([vote("v-1", today), vote("v-2", today - Duration::days(1))]);
    h.source.vote_ranges_time_out.store(true, Ordering::SeqCst);
    h.source.failing_vote_days.lock().unwrap().insert(since);

    let execution = h
        .scheduler()
        .execute_intelligent_scheduler(SchedulerRequest {
            categories: Some(votes_only()),
            ..manual(true)
        })
        .await
        .unwrap();
    let finished = h.finish(execution.execution_id).await;

    assert_eq!(finished.status, ExecutionStatus::Success);
    assert_eq!(finished.counters.votes, 2);
    assert_eq!(finished.counters.fallback_days, 3);
    assert_eq!(finished.counters.errors, 1);
    assert_eq!(h.votes.len(), 2);

    let queries = h.source.vote_queries.lock().unwrap().clone();
    assert_eq!(queries[0], (since, today));
    assert_eq!(queries.len(), 4);
    assert!(queries[1..].iter().all(|(start, end)| start == end));
}

#[tokio::test]
async fn test_failed_category_fails_run_and_releases_lock() {
    let h = Harness::new();
    h.source.legislators_fail.store(true, Ordering::SeqCst);
    let scheduler = h.scheduler();

    let execution = scheduler
        .execute_intelligent_scheduler(manual(true))
        .await
        .unwrap();
    let finished = h.finish(execution.execution_id).await;

    assert_eq!(finished.status, ExecutionStatus::Failed);
    assert!(
        finished
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("legislators sync failed"))
    );
    assert_eq!(h.bills.attempts(), 0, "later categories are skipped");
    assert!(!h.lock.is_held(LockKey::scheduler("manual")));

    h.source.legislators_fail.store(false, Ordering::SeqCst);
    let retry = scheduler
        .execute_intelligent_scheduler(manual(true))
        .await
        .unwrap();
    assert_eq!(h.finish(retry.execution_id).await.status, ExecutionStatus::Success);
}

#[tokio::test]
async fn test_recent_failed_run_counts_toward_interval() {
    let h = Harness::new();
    h.seed_roster(&[1]);

    let mut failed = Execution::start(
        ExecutionKind::SchedulerDaily,
        ExecutionConfig::Scheduler(SchedulerRequest::new(SchedulerType::Daily, "cron")),
        "cron",
    );
    failed.started_at = Utc::now() - Duration::hours(1);
    failed
        .finish(ExecutionStatus::Failed, Some("upstream down".into()), None)
        .unwrap();
    h.executions.insert_raw(failed);

    let err = h
        .scheduler()
        .execute_intelligent_scheduler(SchedulerRequest::new(SchedulerType::Daily, "cron"))
        .await
        .unwrap_err();
    assert!(err.is_not_due(), "unexpected error: {err}");
    assert!(err.message.contains("failed"));
    assert_eq!(h.executions.of_kind(ExecutionKind::SchedulerDaily).len(), 1);
    assert!(!h.lock.is_held(LockKey::scheduler("daily")));
}

#[tokio::test]
async fn test_abandoned_running_row_is_recovered() {
    let h = Harness::new();
    let stale = Execution::start(
        ExecutionKind::SchedulerManual,
        ExecutionConfig::Scheduler(manual(true)),
        "crashed-process",
    );
    let stale_id = stale.execution_id;
    h.executions.insert_raw(stale);

    let execution = h
        .scheduler()
        .execute_intelligent_scheduler(manual(true))
        .await
        .unwrap();
    h.finish(execution.execution_id).await;

    let stale = h
        .executions
        .all()
        .into_iter()
        .find(|e| e.execution_id == stale_id)
        .unwrap();
    assert_eq!(stale.status, ExecutionStatus::Failed);
    assert_eq!(stale.error_message.as_deref(), Some(ABANDONED));
}

#[tokio::test]
async fn test_cancel_stops_between_categories() {
    let h = Harness::new();
    h.seed_roster(&[1]);
    h.seed_bills(Utc::now().year(), 1..=3);
    h.source.hold();
    let scheduler = h.scheduler();

    let execution = scheduler
        .execute_intelligent_scheduler(manual(true))
        .await
        .unwrap();
    assert!(scheduler.cancel_scheduler(SchedulerType::Manual).await.unwrap());
    h.source.release();
    let finished = h.finish(execution.execution_id).await;

    assert_eq!(finished.status, ExecutionStatus::Failed);
    assert!(
        finished
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("cancelled"))
    );
    assert_eq!(h.bills.attempts(), 0);
    assert!(!scheduler.cancel_scheduler(SchedulerType::Manual).await.unwrap());
}

#[tokio::test]
async fn test_request_without_categories_is_rejected() {
    let h = Harness::new();
    let err = h
        .scheduler()
        .execute_intelligent_scheduler(SchedulerRequest {
            categories: Some(CategoryToggles {
                legislators: false,
                bills: false,
                expenses: false,
                votes: false,
            }),
            ..manual(true)
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind, legisync_core::error::ErrorKind::Validation);
    assert!(h.executions.all().is_empty());
    assert!(!h.lock.is_held(LockKey::scheduler("manual")));
}
