//! In-memory ports shared by the service integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Semaphore;
use uuid::Uuid;

use legisync_cache::memory::MemoryCacheProvider;
use legisync_core::config::cache::MemoryCacheConfig;
use legisync_core::config::{BackfillConfig, SchedulerConfig, UpstreamConfig};
use legisync_core::error::AppError;
use legisync_core::result::AppResult;
use legisync_core::traits::{AdvisoryLock, LockKey};
use legisync_core::types::pagination::{PageRequest, PageResponse};
use legisync_database::{CheckpointStore, ExecutionStore, RecordFilter, RecordRepository};
use legisync_entity::checkpoint::{Checkpoint, CheckpointMetadata, CheckpointStatus, DataType};
use legisync_entity::execution::{Execution, ExecutionKind, ExecutionStatus, SyncCounters};
use legisync_entity::record::{Bill, Expense, Legislator, SyncRecord, Vote};
use legisync_service::{SmartBackfillService, SmartSchedulerService, SyncContext, TaskRegistry};
use legisync_upstream::{BillQuery, ExpenseQuery, LegislativeSource, PageQuery, UpstreamError, VoteQuery};

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemCheckpoints {
    rows: Mutex<HashMap<Uuid, Checkpoint>>,
}

impl MemCheckpoints {
    pub fn all(&self) -> Vec<Checkpoint> {
        let mut rows: Vec<Checkpoint> = self.rows.lock().unwrap().values().cloned().collect();
        rows.sort_by_key(|cp| (cp.created_at, cp.id));
        rows
    }

    pub fn for_unit(&self, data_type: DataType, year: Option<i32>) -> Vec<Checkpoint> {
        self.all()
            .into_iter()
            .filter(|cp| cp.covers(data_type, year))
            .collect()
    }
}

#[async_trait]
impl CheckpointStore for MemCheckpoints {
    async fn create(&self, data_type: DataType, metadata: CheckpointMetadata) -> AppResult<Checkpoint> {
        let checkpoint = Checkpoint::new(data_type, metadata);
        self.rows
            .lock()
            .unwrap()
            .insert(checkpoint.id, checkpoint.clone());
        Ok(checkpoint)
    }

    async fn update(&self, checkpoint: &Checkpoint) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let stored = rows
            .get_mut(&checkpoint.id)
            .ok_or_else(|| AppError::not_found(format!("checkpoint {}", checkpoint.id)))?;
        if stored.status.is_terminal() {
            return Err(AppError::conflict(format!(
                "checkpoint {} is already {}",
                stored.id, stored.status
            )));
        }
        *stored = checkpoint.clone();
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Checkpoint> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("checkpoint {id}")))
    }

    async fn list_pending(&self) -> AppResult<Vec<Checkpoint>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|cp| cp.status.is_active())
            .collect())
    }

    async fn latest_for_unit(&self, data_type: DataType, year: Option<i32>) -> AppResult<Option<Checkpoint>> {
        Ok(self.for_unit(data_type, year).pop())
    }

    async fn delete_finished_before(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let len = rows.len();
        rows.retain(|_, cp| !(cp.status.is_terminal() && cp.updated_at < before));
        Ok((len - rows.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemExecutions {
    rows: Mutex<Vec<Execution>>,
}

impl MemExecutions {
    pub fn all(&self) -> Vec<Execution> {
        self.rows.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: ExecutionKind) -> Vec<Execution> {
        self.all().into_iter().filter(|e| e.kind == kind).collect()
    }

    /// Insert a row as if another, since-dead process had left it behind.
    pub fn insert_raw(&self, execution: Execution) {
        self.rows.lock().unwrap().push(execution);
    }

    fn newest(&self, pred: impl Fn(&Execution) -> bool) -> Option<Execution> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| pred(e))
            .max_by_key(|e| e.started_at)
            .cloned()
    }
}

#[async_trait]
impl ExecutionStore for MemExecutions {
    async fn create_execution(&self, execution: &Execution) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|e| e.kind == execution.kind && e.is_running()) {
            return Err(AppError::already_running(format!(
                "{} already has a running execution",
                execution.kind
            )));
        }
        rows.push(execution.clone());
        Ok(())
    }

    async fn update_progress(&self, execution_id: Uuid, counters: &SyncCounters) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|e| e.execution_id == execution_id && e.is_running())
        {
            row.counters = *counters;
        }
        Ok(())
    }

    async fn complete_execution(&self, execution: &Execution) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|e| e.execution_id == execution.execution_id)
            .ok_or_else(|| AppError::not_found(format!("execution {}", execution.execution_id)))?;
        if !row.is_running() {
            return Err(AppError::conflict(format!(
                "execution {} already finalized",
                row.execution_id
            )));
        }
        *row = execution.clone();
        Ok(())
    }

    async fn get_execution(&self, execution_id: Uuid) -> AppResult<Option<Execution>> {
        Ok(self.newest(|e| e.execution_id == execution_id))
    }

    async fn get_running_execution(&self, kind: ExecutionKind) -> AppResult<Option<Execution>> {
        Ok(self.newest(|e| e.kind == kind && e.is_running()))
    }

    async fn last_execution(&self, kind: ExecutionKind) -> AppResult<Option<Execution>> {
        Ok(self.newest(|e| e.kind == kind))
    }

    async fn last_successful_execution(&self, kind: ExecutionKind) -> AppResult<Option<Execution>> {
        Ok(self.newest(|e| e.kind == kind && e.status == ExecutionStatus::Success))
    }

    async fn find_successful_backfill(&self, start_year: i32, end_year: i32) -> AppResult<Option<Execution>> {
        Ok(self.newest(|e| {
            e.kind == ExecutionKind::HistoricalBackfill
                && e.status == ExecutionStatus::Success
                && e
                    .config
                    .as_backfill()
                    .is_some_and(|req| req.covers(start_year, end_year))
        }))
    }

    async fn list_executions(
        &self,
        kind: Option<ExecutionKind>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Execution>> {
        let mut rows: Vec<Execution> = self
            .all()
            .into_iter()
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(PageResponse::slice(rows, page))
    }
}

// ---------------------------------------------------------------------------
// Advisory lock
// ---------------------------------------------------------------------------

/// One lock table shared by every "process" built on it.
#[derive(Debug, Default)]
pub struct MemLock {
    held: Mutex<HashSet<i64>>,
}

impl MemLock {
    pub fn is_held(&self, key: LockKey) -> bool {
        self.held.lock().unwrap().contains(&key.value())
    }
}

#[async_trait]
impl AdvisoryLock for MemLock {
    async fn try_acquire(&self, key: LockKey) -> AppResult<bool> {
        Ok(self.held.lock().unwrap().insert(key.value()))
    }

    async fn release(&self, key: LockKey) -> AppResult<()> {
        self.held.lock().unwrap().remove(&key.value());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Record repositories
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MemRepo<T: SyncRecord> {
    rows: Mutex<BTreeMap<String, T>>,
    /// Natural keys of every successful upsert call, in call order.
    batches: Mutex<Vec<Vec<String>>>,
    attempts: AtomicU32,
    fail_always: AtomicBool,
}

impl<T: SyncRecord> Default for MemRepo<T> {
    fn default() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            batches: Mutex::new(Vec::new()),
            attempts: AtomicU32::new(0),
            fail_always: AtomicBool::new(false),
        }
    }
}

impl<T: SyncRecord> MemRepo<T> {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn snapshot(&self) -> BTreeMap<String, T> {
        self.rows.lock().unwrap().clone()
    }

    pub fn written_keys(&self) -> Vec<String> {
        self.batches.lock().unwrap().concat()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn fail_every_write(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T: SyncRecord> RecordRepository<T> for MemRepo<T> {
    async fn upsert(&self, items: &[T]) -> AppResult<u64> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(AppError::database("connection reset by peer"));
        }
        let mut rows = self.rows.lock().unwrap();
        let mut keys = Vec::with_capacity(items.len());
        for item in items {
            let key = item.natural_key();
            rows.insert(key.clone(), item.clone());
            keys.push(key);
        }
        keys.dedup();
        let written = keys.len() as u64;
        self.batches.lock().unwrap().push(keys);
        Ok(written)
    }

    async fn list(&self, _filter: &RecordFilter, page: &PageRequest) -> AppResult<PageResponse<T>> {
        let all: Vec<T> = self.rows.lock().unwrap().values().cloned().collect();
        Ok(PageResponse::slice(all, page))
    }
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// A scripted upstream API.
#[derive(Debug)]
pub struct FakeSource {
    pub legislators: Mutex<Vec<Legislator>>,
    pub bills: Mutex<Vec<Bill>>,
    pub expenses: Mutex<Vec<Expense>>,
    pub votes: Mutex<Vec<Vote>>,
    /// Multi-day vote queries answer 504.
    pub vote_ranges_time_out: AtomicBool,
    /// Days whose single-day vote query fails.
    pub failing_vote_days: Mutex<HashSet<NaiveDate>>,
    /// The roster endpoint answers 500.
    pub legislators_fail: AtomicBool,
    /// Every vote query seen, as `(start, end)`.
    pub vote_queries: Mutex<Vec<(NaiveDate, NaiveDate)>>,
    held: AtomicBool,
    gate: Semaphore,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self {
            legislators: Mutex::new(Vec::new()),
            bills: Mutex::new(Vec::new()),
            expenses: Mutex::new(Vec::new()),
            votes: Mutex::new(Vec::new()),
            vote_ranges_time_out: AtomicBool::new(false),
            failing_vote_days: Mutex::new(HashSet::new()),
            legislators_fail: AtomicBool::new(false),
            vote_queries: Mutex::new(Vec::new()),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }
}

impl FakeSource {
    /// Block roster fetches until `release` is called.
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.add_permits(1024);
    }

    async fn pass_gate(&self) {
        if self.held.load(Ordering::SeqCst) {
            let _ = self.gate.acquire().await;
        }
    }
}

fn page_of<T: Clone>(items: Vec<T>, page: u32, per_page: u32) -> Vec<T> {
    items
        .into_iter()
        .skip(((page.max(1) - 1) * per_page) as usize)
        .take(per_page as usize)
        .collect()
}

#[async_trait]
impl LegislativeSource for FakeSource {
    async fn fetch_legislators(&self, page: PageQuery) -> Result<Vec<Legislator>, UpstreamError> {
        self.pass_gate().await;
        if self.legislators_fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::from_status("/deputados", 500, None));
        }
        let all = self.legislators.lock().unwrap().clone();
        Ok(page_of(all, page.page, page.per_page))
    }

    async fn fetch_bills(&self, query: BillQuery) -> Result<Vec<Bill>, UpstreamError> {
        let all: Vec<Bill> = self
            .bills
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.year == query.year)
            .cloned()
            .collect();
        Ok(page_of(all, query.page, query.per_page))
    }

    async fn fetch_expenses(&self, query: ExpenseQuery) -> Result<Vec<Expense>, UpstreamError> {
        let all: Vec<Expense> = self
            .expenses
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.legislator_id == query.legislator_id
                    && e.year == query.year
                    && query.month.is_none_or(|m| e.month == m as i32)
            })
            .cloned()
            .collect();
        Ok(page_of(all, query.page, query.per_page))
    }

    async fn fetch_votes(&self, query: VoteQuery) -> Result<Vec<Vote>, UpstreamError> {
        self.vote_queries
            .lock()
            .unwrap()
            .push((query.start, query.end));
        if query.start != query.end && self.vote_ranges_time_out.load(Ordering::SeqCst) {
            return Err(UpstreamError::GatewayTimeout {
                endpoint: "/votacoes".into(),
            });
        }
        if query.start == query.end && self.failing_vote_days.lock().unwrap().contains(&query.start) {
            return Err(UpstreamError::from_status("/votacoes", 502, None));
        }
        let all: Vec<Vote> = self
            .votes
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.date >= query.start && v.date <= query.end)
            .cloned()
            .collect();
        Ok(page_of(all, query.page, query.per_page))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn legislator(id: i64) -> Legislator {
    Legislator {
        id,
        name: format!("Deputado {id}"),
        party: Some("PX".into()),
        state: Some("SP".into()),
        legislature_id: Some(57),
        email: None,
        photo_url: None,
        synced_at: Utc::now(),
    }
}

pub fn bill(id: i64, year: i32) -> Bill {
    Bill {
        id,
        bill_type: "PL".into(),
        number: id as i32,
        year,
        summary: Some(format!("Projeto {id}")),
        presented_at: None,
        synced_at: Utc::now(),
    }
}

pub fn expense(legislator_id: i64, year: i32, month: i32, code: i64) -> Expense {
    Expense {
        id: Expense::compose_id(legislator_id, year, month, code, None),
        legislator_id,
        year,
        month,
        expense_type: "COMBUSTIVEIS".into(),
        supplier_name: None,
        supplier_document: None,
        document_number: None,
        document_date: None,
        amount_cents: 10_000,
        synced_at: Utc::now(),
    }
}

pub fn vote(id: &str, date: NaiveDate) -> Vote {
    Vote {
        id: id.into(),
        date,
        registered_at: None,
        body: Some("PLEN".into()),
        description: None,
        approved: Some(true),
        bill_uri: None,
        synced_at: Utc::now(),
    }
}

pub fn backfill_config() -> BackfillConfig {
    BackfillConfig {
        batch_size: 2,
        max_retries: 2,
        retry_delay_millis: 1,
        vote_workers: 2,
        day_delay_millis: 0,
        ..BackfillConfig::default()
    }
}

pub fn scheduler_config() -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    config.manual.min_interval_hours = 0;
    config.manual.lookback_days = 2;
    config.daily.lookback_days = 2;
    config
}

/// Every port of one process, backed by memory.
#[derive(Debug)]
pub struct Harness {
    pub source: Arc<FakeSource>,
    pub legislators: Arc<MemRepo<Legislator>>,
    pub bills: Arc<MemRepo<Bill>>,
    pub expenses: Arc<MemRepo<Expense>>,
    pub votes: Arc<MemRepo<Vote>>,
    pub executions: Arc<MemExecutions>,
    pub checkpoints: Arc<MemCheckpoints>,
    pub lock: Arc<MemLock>,
    pub tasks: Arc<TaskRegistry>,
    pub ctx: Arc<SyncContext>,
}

impl Harness {
    pub fn new() -> Self {
        let source = Arc::new(FakeSource::default());
        let legislators = Arc::new(MemRepo::default());
        let bills = Arc::new(MemRepo::default());
        let expenses = Arc::new(MemRepo::default());
        let votes = Arc::new(MemRepo::default());
        let cache = Arc::new(MemoryCacheProvider::new(&MemoryCacheConfig::default(), 300));
        let upstream = UpstreamConfig {
            page_size: 3,
            ..UpstreamConfig::default()
        };
        let ctx = Arc::new(SyncContext::new(
            source.clone(),
            legislators.clone(),
            bills.clone(),
            expenses.clone(),
            votes.clone(),
            cache,
            &upstream,
            2,
        ));
        Self {
            source,
            legislators,
            bills,
            expenses,
            votes,
            executions: Arc::new(MemExecutions::default()),
            checkpoints: Arc::new(MemCheckpoints::default()),
            lock: Arc::new(MemLock::default()),
            tasks: Arc::new(TaskRegistry::new()),
            ctx,
        }
    }

    /// A scheduler service as one process would build it. Services built
    /// from the same harness share storage, the lock table, and the task
    /// registry the tests wait on.
    pub fn scheduler(&self) -> SmartSchedulerService {
        SmartSchedulerService::new(
            Arc::clone(&self.ctx),
            self.executions.clone(),
            self.lock.clone(),
            Arc::clone(&self.tasks),
            scheduler_config(),
            &backfill_config(),
        )
    }

    pub fn backfill(&self) -> SmartBackfillService {
        self.backfill_with(backfill_config())
    }

    pub fn backfill_with(&self, config: BackfillConfig) -> SmartBackfillService {
        SmartBackfillService::new(
            Arc::clone(&self.ctx),
            self.executions.clone(),
            self.checkpoints.clone(),
            self.lock.clone(),
            Arc::clone(&self.tasks),
            config,
        )
    }

    /// Wait for a run spawned through `tasks` and return its final row.
    pub async fn finish(&self, execution_id: Uuid) -> Execution {
        assert!(self.tasks.wait(execution_id).await, "run was not spawned here");
        self.executions
            .get_execution(execution_id)
            .await
            .unwrap()
            .expect("execution row")
    }

    pub fn seed_roster(&self, ids: &[i64]) {
        *self.source.legislators.lock().unwrap() = ids.iter().map(|id| legislator(*id)).collect();
    }

    pub fn seed_bills(&self, year: i32, ids: std::ops::RangeInclusive<i64>) {
        self.source
            .bills
            .lock()
            .unwrap()
            .extend(ids.map(|id| bill(id, year)));
    }

    pub fn checkpoint_statuses(&self) -> Vec<(String, CheckpointStatus)> {
        self.checkpoints
            .all()
            .into_iter()
            .map(|cp| (cp.unit_label(), cp.status))
            .collect()
    }
}
