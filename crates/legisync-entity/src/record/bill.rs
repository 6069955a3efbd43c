//! Bill entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SyncRecord;
use crate::checkpoint::DataType;

/// A legislative proposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Bill {
    /// Upstream proposition ID.
    pub id: i64,
    /// Type acronym (`PL`, `PEC`, ...).
    pub bill_type: String,
    /// Number within type and year.
    pub number: i32,
    /// Year of presentation.
    pub year: i32,
    /// Summary text.
    pub summary: Option<String>,
    /// Presentation timestamp.
    pub presented_at: Option<DateTime<Utc>>,
    /// When this row was fetched from upstream.
    pub synced_at: DateTime<Utc>,
}

impl SyncRecord for Bill {
    const DATA_TYPE: DataType = DataType::Bills;

    fn natural_key(&self) -> String {
        format!("{:012}", self.id)
    }
}
