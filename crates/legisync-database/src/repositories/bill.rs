//! Bill repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use legisync_core::error::{AppError, ErrorKind};
use legisync_core::result::AppResult;
use legisync_core::types::pagination::{PageRequest, PageResponse};
use legisync_entity::record::Bill;

use crate::traits::{RecordFilter, RecordRepository, dedup_last};

/// Repository for bills.
#[derive(Debug, Clone)]
pub struct BillRepository {
    pool: PgPool,
}

impl BillRepository {
    /// Create a new bill repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordRepository<Bill> for BillRepository {
    async fn upsert(&self, items: &[Bill]) -> AppResult<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        let rows = dedup_last(items);

        let mut ids = Vec::with_capacity(rows.len());
        let mut types = Vec::with_capacity(rows.len());
        let mut numbers = Vec::with_capacity(rows.len());
        let mut years = Vec::with_capacity(rows.len());
        let mut summaries = Vec::with_capacity(rows.len());
        let mut presented = Vec::with_capacity(rows.len());
        let mut synced = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.id);
            types.push(row.bill_type);
            numbers.push(row.number);
            years.push(row.year);
            summaries.push(row.summary);
            presented.push(row.presented_at);
            synced.push(row.synced_at);
        }

        let result = sqlx::query(
            "INSERT INTO bills (id, bill_type, number, year, summary, presented_at, synced_at) \
             SELECT * FROM UNNEST($1::bigint[], $2::text[], $3::int[], $4::int[], \
                                  $5::text[], $6::timestamptz[], $7::timestamptz[]) \
             ON CONFLICT (id) DO UPDATE SET \
                bill_type = EXCLUDED.bill_type, number = EXCLUDED.number, \
                year = EXCLUDED.year, summary = EXCLUDED.summary, \
                presented_at = EXCLUDED.presented_at, synced_at = EXCLUDED.synced_at",
        )
        .bind(ids)
        .bind(types)
        .bind(numbers)
        .bind(years)
        .bind(summaries)
        .bind(presented)
        .bind(synced)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert bills", e))?;

        Ok(result.rows_affected())
    }

    async fn list(&self, filter: &RecordFilter, page: &PageRequest) -> AppResult<PageResponse<Bill>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bills WHERE ($1::int IS NULL OR year = $1)",
        )
        .bind(filter.year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count bills", e))?;

        let items = sqlx::query_as::<_, Bill>(
            "SELECT * FROM bills WHERE ($1::int IS NULL OR year = $1) \
             ORDER BY year DESC, number DESC, id ASC LIMIT $2 OFFSET $3",
        )
        .bind(filter.year)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list bills", e))?;

        Ok(PageResponse::new(items, page, total as u64))
    }
}
