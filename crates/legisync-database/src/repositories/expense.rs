//! Expense repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use legisync_core::error::{AppError, ErrorKind};
use legisync_core::result::AppResult;
use legisync_core::types::pagination::{PageRequest, PageResponse};
use legisync_entity::record::Expense;

use crate::traits::{RecordFilter, RecordRepository, dedup_last};

/// Repository for parliamentary-quota expenses.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: PgPool,
}

impl ExpenseRepository {
    /// Create a new expense repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordRepository<Expense> for ExpenseRepository {
    async fn upsert(&self, items: &[Expense]) -> AppResult<u64> {
        if items.is_empty() {
            return Ok(0);
        }
        let rows = dedup_last(items);

        let n = rows.len();
        let mut ids = Vec::with_capacity(n);
        let mut legislators = Vec::with_capacity(n);
        let mut years = Vec::with_capacity(n);
        let mut months = Vec::with_capacity(n);
        let mut types = Vec::with_capacity(n);
        let mut suppliers = Vec::with_capacity(n);
        let mut documents = Vec::with_capacity(n);
        let mut numbers = Vec::with_capacity(n);
        let mut dates = Vec::with_capacity(n);
        let mut amounts = Vec::with_capacity(n);
        let mut synced = Vec::with_capacity(n);
        for row in rows {
            ids.push(row.id);
            legislators.push(row.legislator_id);
            years.push(row.year);
            months.push(row.month);
            types.push(row.expense_type);
            suppliers.push(row.supplier_name);
            documents.push(row.supplier_document);
            numbers.push(row.document_number);
            dates.push(row.document_date);
            amounts.push(row.amount_cents);
            synced.push(row.synced_at);
        }

        let result = sqlx::query(
            "INSERT INTO expenses \
             (id, legislator_id, year, month, expense_type, supplier_name, supplier_document, \
              document_number, document_date, amount_cents, synced_at) \
             SELECT * FROM UNNEST($1::text[], $2::bigint[], $3::int[], $4::int[], $5::text[], \
                                  $6::text[], $7::text[], $8::text[], $9::date[], \
                                  $10::bigint[], $11::timestamptz[]) \
             ON CONFLICT (id) DO UPDATE SET \
                legislator_id = EXCLUDED.legislator_id, year = EXCLUDED.year, \
                month = EXCLUDED.month, expense_type = EXCLUDED.expense_type, \
                supplier_name = EXCLUDED.supplier_name, \
                supplier_document = EXCLUDED.supplier_document, \
                document_number = EXCLUDED.document_number, \
                document_date = EXCLUDED.document_date, \
                amount_cents = EXCLUDED.amount_cents, synced_at = EXCLUDED.synced_at",
        )
        .bind(ids)
        .bind(legislators)
        .bind(years)
        .bind(months)
        .bind(types)
        .bind(suppliers)
        .bind(documents)
        .bind(numbers)
        .bind(dates)
        .bind(amounts)
        .bind(synced)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert expenses", e))?;

        Ok(result.rows_affected())
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Expense>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM expenses \
             WHERE ($1::int IS NULL OR year = $1) AND ($2::bigint IS NULL OR legislator_id = $2)",
        )
        .bind(filter.year)
        .bind(filter.legislator_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count expenses", e))?;

        let items = sqlx::query_as::<_, Expense>(
            "SELECT * FROM expenses \
             WHERE ($1::int IS NULL OR year = $1) AND ($2::bigint IS NULL OR legislator_id = $2) \
             ORDER BY year DESC, month DESC, id ASC LIMIT $3 OFFSET $4",
        )
        .bind(filter.year)
        .bind(filter.legislator_id)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list expenses", e))?;

        Ok(PageResponse::new(items, page, total as u64))
    }
}
