//! Checkpoint repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use legisync_core::error::{AppError, ErrorKind};
use legisync_core::result::AppResult;
use legisync_entity::checkpoint::{Checkpoint, CheckpointMetadata, DataType};

use crate::traits::CheckpointStore;

/// Repository for backfill checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointRepository {
    pool: PgPool,
}

impl CheckpointRepository {
    /// Create a new checkpoint repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: Uuid) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM backfill_checkpoints WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to look up checkpoint", e))
    }
}

#[async_trait]
impl CheckpointStore for CheckpointRepository {
    async fn create(
        &self,
        data_type: DataType,
        metadata: CheckpointMetadata,
    ) -> AppResult<Checkpoint> {
        let cp = Checkpoint::new(data_type, metadata);
        sqlx::query_as::<_, Checkpoint>(
            "INSERT INTO backfill_checkpoints \
             (id, data_type, status, progress, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(cp.id)
        .bind(cp.data_type)
        .bind(cp.status)
        .bind(Json(&cp.progress))
        .bind(Json(&cp.metadata))
        .bind(cp.created_at)
        .bind(cp.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create checkpoint", e))
    }

    async fn update(&self, checkpoint: &Checkpoint) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE backfill_checkpoints SET status = $2, progress = $3, metadata = $4, \
             updated_at = $5, started_at = $6, completed_at = $7, error_message = $8 \
             WHERE id = $1 AND status IN ('pending', 'in_progress')",
        )
        .bind(checkpoint.id)
        .bind(checkpoint.status)
        .bind(Json(&checkpoint.progress))
        .bind(Json(&checkpoint.metadata))
        .bind(checkpoint.updated_at)
        .bind(checkpoint.started_at)
        .bind(checkpoint.completed_at)
        .bind(&checkpoint.error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update checkpoint", e))?;

        if result.rows_affected() == 0 {
            if self.exists(checkpoint.id).await? {
                return Err(AppError::conflict(format!(
                    "Checkpoint {} is already finalized",
                    checkpoint.id
                )));
            }
            return Err(AppError::not_found(format!(
                "Checkpoint {} not found",
                checkpoint.id
            )));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Checkpoint> {
        sqlx::query_as::<_, Checkpoint>("SELECT * FROM backfill_checkpoints WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find checkpoint", e))?
            .ok_or_else(|| AppError::not_found(format!("Checkpoint {id} not found")))
    }

    async fn list_pending(&self) -> AppResult<Vec<Checkpoint>> {
        sqlx::query_as::<_, Checkpoint>(
            "SELECT * FROM backfill_checkpoints \
             WHERE status IN ('pending', 'in_progress') \
             ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list pending checkpoints", e)
        })
    }

    async fn latest_for_unit(
        &self,
        data_type: DataType,
        year: Option<i32>,
    ) -> AppResult<Option<Checkpoint>> {
        sqlx::query_as::<_, Checkpoint>(
            "SELECT * FROM backfill_checkpoints \
             WHERE data_type = $1 AND (metadata->>'year')::int IS NOT DISTINCT FROM $2 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(data_type)
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find unit checkpoint", e))
    }

    async fn delete_finished_before(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM backfill_checkpoints \
             WHERE status IN ('completed', 'failed') AND updated_at < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete checkpoints", e))?;
        Ok(result.rows_affected())
    }
}
