//! PostgreSQL session-level advisory locks.
//!
//! A session lock belongs to the connection that took it, so the connection
//! is checked out of the pool and parked here until release. Returning it
//! to the pool while the lock is held would leak the lock to whichever task
//! borrows that connection next.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgPool, Postgres};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use legisync_core::error::{AppError, ErrorKind};
use legisync_core::result::AppResult;
use legisync_core::traits::{AdvisoryLock, LockKey};

/// Advisory lock backed by `pg_try_advisory_lock`.
#[derive(Debug)]
pub struct PgAdvisoryLock {
    pool: PgPool,
    held: Mutex<HashMap<i64, PoolConnection<Postgres>>>,
}

impl PgAdvisoryLock {
    /// Create a lock manager over a pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            held: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys currently held by this process.
    pub async fn held_count(&self) -> usize {
        self.held.lock().await.len()
    }
}

#[async_trait]
impl AdvisoryLock for PgAdvisoryLock {
    async fn try_acquire(&self, key: LockKey) -> AppResult<bool> {
        let mut held = self.held.lock().await;
        // Session locks are reentrant; a second holder in this process is refused here.
        if held.contains_key(&key.value()) {
            debug!(key = %key, "Advisory lock already held by this process");
            return Ok(false);
        }

        let mut conn = self.pool.acquire().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to acquire lock connection", e)
        })?;

        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key.value())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to try advisory lock", e))?;

        if acquired {
            debug!(key = %key, "Advisory lock acquired");
            held.insert(key.value(), conn);
        }
        Ok(acquired)
    }

    async fn release(&self, key: LockKey) -> AppResult<()> {
        let Some(mut conn) = self.held.lock().await.remove(&key.value()) else {
            warn!(key = %key, "Release requested for an advisory lock that is not held");
            return Ok(());
        };

        let unlocked = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(key.value())
            .fetch_one(&mut *conn)
            .await;

        match unlocked {
            Ok(true) => {
                debug!(key = %key, "Advisory lock released");
                Ok(())
            }
            Ok(false) => {
                warn!(key = %key, "Advisory lock was not held by its session; closing connection");
                let _ = conn.detach().close().await;
                Ok(())
            }
            Err(e) => {
                // Ending the session drops every lock it holds.
                let _ = conn.detach().close().await;
                Err(AppError::with_source(
                    ErrorKind::Database,
                    "Failed to release advisory lock; session closed instead",
                    e,
                ))
            }
        }
    }
}
