//! Vote repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use legisync_core::error::{AppError, ErrorKind};
use legisync_core::result::AppResult;
use legisync_core::types::pagination::{PageRequest, PageResponse};
use legisync_entity::record::Vote;

use crate::traits::{RecordFilter, RecordRepository, dedup_last};

/// Repository for plenary votes.
#[derive(Debug, Clone)]
pub struct VoteRepository {
    pool: PgPool,
}

impl VoteRepository {
    /// Create a new vote repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordRepository<Vote> for VoteRepository {
    async fn upsert(&self, items: &[Vote]) -> AppResult<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        let rows = dedup_last(items);

        let n = rows.len();
        let mut ids = Vec::with_capacity(n);
        let mut dates = Vec::with_capacity(n);
        let mut registered = Vec::with_capacity(n);
        let mut bodies = Vec::with_capacity(n);
        let mut descriptions = Vec::with_capacity(n);
        let mut approved = Vec::with_capacity(n);
        let mut uris = Vec::with_capacity(n);
        let mut synced = Vec::with_capacity(n);
        for row in rows {
            ids.push(row.id);
            dates.push(row.date);
            registered.push(row.registered_at);
            bodies.push(row.body);
            descriptions.push(row.description);
            approved.push(row.approved);
            uris.push(row.bill_uri);
            synced.push(row.synced_at);
        }

        let result = sqlx::query(
            "INSERT INTO votes \
             (id, date, registered_at, body, description, approved, bill_uri, synced_at) \
             SELECT * FROM UNNEST($1::text[], $2::date[], $3::timestamptz[], $4::text[], \
                                  $5::text[], $6::bool[], $7::text[], $8::timestamptz[]) \
             ON CONFLICT (id) DO UPDATE SET \
                date = EXCLUDED.date, registered_at = EXCLUDED.registered_at, \
                body = EXCLUDED.body, description = EXCLUDED.description, \
                approved = EXCLUDED.approved, bill_uri = EXCLUDED.bill_uri, \
                synced_at = EXCLUDED.synced_at",
        )
        .bind(ids)
        .bind(dates)
        .bind(registered)
        .bind(bodies)
        .bind(descriptions)
        .bind(approved)
        .bind(uris)
        .bind(synced)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert votes", e))?;

        Ok(result.rows_affected())
    }

    async fn list(&self, filter: &RecordFilter, page: &PageRequest) -> AppResult<PageResponse<Vote>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM votes \
             WHERE ($1::date IS NULL OR date >= $1) AND ($2::date IS NULL OR date <= $2)",
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count votes", e))?;

        let items = sqlx::query_as::<_, Vote>(
            "SELECT * FROM votes \
             WHERE ($1::date IS NULL OR date >= $1) AND ($2::date IS NULL OR date <= $2) \
             ORDER BY date DESC, id ASC LIMIT $3 OFFSET $4",
        )
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list votes", e))?;

        Ok(PageResponse::new(items, page, total as u64))
    }
}
