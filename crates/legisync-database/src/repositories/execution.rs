//! Execution repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use legisync_core::error::{AppError, ErrorKind};
use legisync_core::result::AppResult;
use legisync_core::types::pagination::{PageRequest, PageResponse};
use legisync_entity::execution::{Execution, ExecutionKind, SyncCounters};

use crate::traits::ExecutionStore;

/// Repository for backfill and scheduler run history.
#[derive(Debug, Clone)]
pub struct ExecutionRepository {
    pool: PgPool,
}

impl ExecutionRepository {
    /// Create a new execution repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for ExecutionRepository {
    async fn create_execution(&self, execution: &Execution) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO sync_executions \
             (execution_id, kind, status, counters, started_at, triggered_by, config) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(execution.execution_id)
        .bind(execution.kind)
        .bind(execution.status)
        .bind(Json(&execution.counters))
        .bind(execution.started_at)
        .bind(&execution.triggered_by)
        .bind(Json(&execution.config))
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::already_running(
                format!("An execution of kind {} is already running", execution.kind),
            ),
            _ => AppError::with_source(ErrorKind::Database, "Failed to create execution", e),
        })?;
        Ok(())
    }

    async fn update_progress(&self, execution_id: Uuid, counters: &SyncCounters) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE sync_executions SET counters = $2 \
             WHERE execution_id = $1 AND status = 'running'",
        )
        .bind(execution_id)
        .bind(Json(counters))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update execution progress", e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::conflict(format!(
                "Execution {execution_id} is not running"
            )));
        }
        Ok(())
    }

    async fn complete_execution(&self, execution: &Execution) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE sync_executions SET status = $2, counters = $3, completed_at = $4, \
             duration_seconds = $5, error_message = $6, next_execution = $7 \
             WHERE execution_id = $1 AND status = 'running'",
        )
        .bind(execution.execution_id)
        .bind(execution.status)
        .bind(Json(&execution.counters))
        .bind(execution.completed_at)
        .bind(execution.duration_seconds)
        .bind(&execution.error_message)
        .bind(execution.next_execution)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete execution", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::conflict(format!(
                "Execution {} was already finalized",
                execution.execution_id
            )));
        }
        Ok(())
    }

    async fn get_execution(&self, execution_id: Uuid) -> AppResult<Option<Execution>> {
        sqlx::query_as::<_, Execution>("SELECT * FROM sync_executions WHERE execution_id = $1")
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find execution", e))
    }

    async fn get_running_execution(&self, kind: ExecutionKind) -> AppResult<Option<Execution>> {
        sqlx::query_as::<_, Execution>(
            "SELECT * FROM sync_executions WHERE kind = $1 AND status = 'running' \
             ORDER BY started_at DESC LIMIT 1",
        )
        .bind(kind)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find running execution", e)
        })
    }

    async fn last_execution(&self, kind: ExecutionKind) -> AppResult<Option<Execution>> {
        sqlx::query_as::<_, Execution>(
            "SELECT * FROM sync_executions WHERE kind = $1 ORDER BY started_at DESC LIMIT 1",
        )
        .bind(kind)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find last execution", e))
    }

    async fn last_successful_execution(
        &self,
        kind: ExecutionKind,
    ) -> AppResult<Option<Execution>> {
        sqlx::query_as::<_, Execution>(
            "SELECT * FROM sync_executions WHERE kind = $1 AND status = 'success' \
             ORDER BY started_at DESC LIMIT 1",
        )
        .bind(kind)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find last successful execution", e)
        })
    }

    async fn find_successful_backfill(
        &self,
        start_year: i32,
        end_year: i32,
    ) -> AppResult<Option<Execution>> {
        sqlx::query_as::<_, Execution>(
            "SELECT * FROM sync_executions \
             WHERE kind = 'historical_backfill' AND status = 'success' \
             AND (config->>'start_year')::int <= $1 AND (config->>'end_year')::int >= $2 \
             ORDER BY started_at DESC LIMIT 1",
        )
        .bind(start_year)
        .bind(end_year)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find covering backfill", e)
        })
    }

    async fn list_executions(
        &self,
        kind: Option<ExecutionKind>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Execution>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sync_executions WHERE ($1::execution_kind IS NULL OR kind = $1)",
        )
        .bind(kind)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count executions", e))?;

        let executions = sqlx::query_as::<_, Execution>(
            "SELECT * FROM sync_executions WHERE ($1::execution_kind IS NULL OR kind = $1) \
             ORDER BY started_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(kind)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list executions", e))?;

        Ok(PageResponse::new(executions, page, total as u64))
    }
}
