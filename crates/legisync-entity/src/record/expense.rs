//! Expense entity model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SyncRecord;
use crate::checkpoint::DataType;

/// A reimbursed parliamentary-quota expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Expense {
    /// Composite natural key built from legislator, period and document.
    pub id: String,
    /// Legislator who incurred the expense.
    pub legislator_id: i64,
    /// Reference year.
    pub year: i32,
    /// Reference month (1-12).
    pub month: i32,
    /// Expense category.
    pub expense_type: String,
    /// Supplier name.
    pub supplier_name: Option<String>,
    /// Supplier tax document (CNPJ/CPF).
    pub supplier_document: Option<String>,
    /// Receipt number.
    pub document_number: Option<String>,
    /// Receipt date.
    pub document_date: Option<NaiveDate>,
    /// Net amount in cents.
    pub amount_cents: i64,
    /// When this row was fetched from upstream.
    pub synced_at: DateTime<Utc>,
}

impl Expense {
    /// Build the composite natural key.
    pub fn compose_id(
        legislator_id: i64,
        year: i32,
        month: i32,
        document_code: i64,
        document_number: Option<&str>,
    ) -> String {
        format!(
            "{legislator_id}-{year}-{month:02}-{document_code}-{}",
            document_number.unwrap_or("")
        )
    }
}

impl SyncRecord for Expense {
    const DATA_TYPE: DataType = DataType::Expenses;

    fn natural_key(&self) -> String {
        self.id.clone()
    }
}
