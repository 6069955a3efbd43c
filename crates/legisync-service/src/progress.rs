//! Per-execution counters shared by concurrent workers.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use legisync_database::ExecutionStore;
use legisync_entity::execution::SyncCounters;

/// Accumulates the counters of one execution and persists every change.
///
/// Updates are applied and written while holding the lock, so the durable
/// record only ever moves forward and readers never see a torn snapshot.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    execution_id: Uuid,
    counters: Arc<Mutex<SyncCounters>>,
    store: Arc<dyn ExecutionStore>,
}

impl ProgressTracker {
    /// Start tracking an execution from zero.
    pub fn new(execution_id: Uuid, store: Arc<dyn ExecutionStore>) -> Self {
        Self {
            execution_id,
            counters: Arc::new(Mutex::new(SyncCounters::default())),
            store,
        }
    }

    /// Execution being tracked.
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Apply an update and persist the result.
    ///
    /// A failed write is logged and not retried; the next update rewrites
    /// the full counter set.
    pub async fn record(&self, update: impl FnOnce(&mut SyncCounters)) -> SyncCounters {
        let mut counters = self.counters.lock().await;
        update(&mut counters);
        let snapshot = *counters;
        if let Err(e) = self.store.update_progress(self.execution_id, &snapshot).await {
            warn!(execution_id = %self.execution_id, error = %e, "Failed to persist progress");
        }
        snapshot
    }

    /// Current counters.
    pub async fn snapshot(&self) -> SyncCounters {
        *self.counters.lock().await
    }
}
