//! Supervised registry of long-running orchestration tasks.
//!
//! Every backfill or scheduler run is spawned through the registry under
//! its execution ID, with its own cancellation token, so it can be
//! cancelled, awaited (tests, CLI), or drained on shutdown.

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug)]
struct TaskEntry {
    label: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registry of in-flight orchestration tasks, keyed by execution ID.
#[derive(Debug)]
pub struct TaskRegistry {
    tasks: DashMap<Uuid, TaskEntry>,
    /// Parent of every task token; cancelled on shutdown.
    root: CancellationToken,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            root: CancellationToken::new(),
        }
    }

    /// Spawn a task under `id`. The closure receives the task's
    /// cancellation token.
    pub fn spawn<F, Fut>(&self, id: Uuid, label: impl Into<String>, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.prune();
        let label = label.into();
        let cancel = self.root.child_token();
        let handle = tokio::spawn(task(cancel.clone()));
        debug!(task_id = %id, label = %label, "Task spawned");
        self.tasks.insert(id, TaskEntry { label, cancel, handle });
    }

    /// Request cancellation of a task. Returns `false` if no such task is
    /// running in this process.
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.tasks.get(&id) {
            Some(entry) if !entry.handle.is_finished() => {
                info!(task_id = %id, label = %entry.label, "Cancelling task");
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Whether a task is registered and still running.
    pub fn is_active(&self, id: Uuid) -> bool {
        self.tasks
            .get(&id)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    /// Number of tasks still running.
    pub fn active_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|entry| !entry.handle.is_finished())
            .count()
    }

    /// Wait for a task to finish. Returns `false` if the task is unknown
    /// (never spawned, or already awaited).
    pub async fn wait(&self, id: Uuid) -> bool {
        let Some((_, entry)) = self.tasks.remove(&id) else {
            return false;
        };
        if let Err(e) = entry.handle.await {
            warn!(task_id = %id, label = %entry.label, error = %e, "Task ended abnormally");
        }
        true
    }

    /// Cancel every task and wait up to `grace` for them to stop.
    pub async fn shutdown(&self, grace: Duration) {
        self.root.cancel();
        let ids: Vec<Uuid> = self.tasks.iter().map(|entry| *entry.key()).collect();
        info!(tasks = ids.len(), "Stopping orchestration tasks");

        let drain = async {
            for id in ids {
                self.wait(id).await;
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                remaining = self.active_count(),
                "Orchestration tasks still running after the grace period"
            );
        }
    }

    fn prune(&self) {
        self.tasks.retain(|_, entry| !entry.handle.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_reaches_the_task() {
        let registry = TaskRegistry::new();
        let id = Uuid::new_v4();
        let (tx, rx) = tokio::sync::oneshot::channel();
        registry.spawn(id, "test", |cancel| async move {
            cancel.cancelled().await;
            let _ = tx.send("stopped");
        });

        assert!(registry.is_active(id));
        assert!(registry.cancel(id));
        assert_eq!(rx.await.unwrap(), "stopped");
        assert!(registry.wait(id).await);
        assert!(!registry.wait(id).await);
    }

    #[tokio::test]
    async fn test_cancel_unknown_task() {
        let registry = TaskRegistry::new();
        assert!(!registry.cancel(Uuid::new_v4()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        let registry = TaskRegistry::new();
        for _ in 0..3 {
            registry.spawn(Uuid::new_v4(), "sleeper", |cancel| async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(Duration::from_secs(3600)) => {}
                }
            });
        }
        assert_eq!(registry.active_count(), 3);
        registry.shutdown(Duration::from_secs(5)).await;
        assert_eq!(registry.active_count(), 0);
    }
}
