//! Legislator repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use legisync_core::error::{AppError, ErrorKind};
use legisync_core::result::AppResult;
use legisync_core::types::pagination::{PageRequest, PageResponse};
use legisync_entity::record::Legislator;

use crate::traits::{RecordFilter, RecordRepository, dedup_last};

/// Repository for the legislator roster.
#[derive(Debug, Clone)]
pub struct LegislatorRepository {
    pool: PgPool,
}

impl LegislatorRepository {
    /// Create a new legislator repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordRepository<Legislator> for LegislatorRepository {
    async fn upsert(&self, items: &[Legislator]) -> AppResult<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        let rows = dedup_last(items);

        let mut ids = Vec::with_capacity(rows.len());
        let mut names = Vec::with_capacity(rows.len());
        let mut parties = Vec::with_capacity(rows.len());
        let mut states = Vec::with_capacity(rows.len());
        let mut legislatures = Vec::with_capacity(rows.len());
        let mut emails = Vec::with_capacity(rows.len());
        let mut photos = Vec::with_capacity(rows.len());
        let mut synced: Vec<DateTime<Utc>> = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.id);
            names.push(row.name);
            parties.push(row.party);
            states.push(row.state);
            legislatures.push(row.legislature_id);
            emails.push(row.email);
            photos.push(row.photo_url);
            synced.push(row.synced_at);
        }

        let result = sqlx::query(
            "INSERT INTO legislators \
             (id, name, party, state, legislature_id, email, photo_url, synced_at) \
             SELECT * FROM UNNEST($1::bigint[], $2::text[], $3::text[], $4::text[], \
                                  $5::int[], $6::text[], $7::text[], $8::timestamptz[]) \
             ON CONFLICT (id) DO UPDATE SET \
                name = EXCLUDED.name, party = EXCLUDED.party, state = EXCLUDED.state, \
                legislature_id = EXCLUDED.legislature_id, email = EXCLUDED.email, \
                photo_url = EXCLUDED.photo_url, synced_at = EXCLUDED.synced_at",
        )
        .bind(ids)
        .bind(names)
        .bind(parties)
        .bind(states)
        .bind(legislatures)
        .bind(emails)
        .bind(photos)
        .bind(synced)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert legislators", e))?;

        Ok(result.rows_affected())
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Legislator>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM legislators WHERE ($1::text IS NULL OR state = $1)",
        )
        .bind(&filter.state)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count legislators", e))?;

        let items = sqlx::query_as::<_, Legislator>(
            "SELECT * FROM legislators WHERE ($1::text IS NULL OR state = $1) \
             ORDER BY name ASC, id ASC LIMIT $2 OFFSET $3",
        )
        .bind(&filter.state)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list legislators", e))?;

        Ok(PageResponse::new(items, page, total as u64))
    }
}
