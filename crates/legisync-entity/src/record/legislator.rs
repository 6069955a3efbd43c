//! Legislator entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SyncRecord;
use crate::checkpoint::DataType;

/// A member of the Chamber of Deputies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Legislator {
    /// Upstream deputy ID.
    pub id: i64,
    /// Parliamentary name.
    pub name: String,
    /// Party acronym.
    pub party: Option<String>,
    /// Federative unit (state) acronym.
    pub state: Option<String>,
    /// Legislature number.
    pub legislature_id: Option<i32>,
    /// Contact e-mail.
    pub email: Option<String>,
    /// Photo URL.
    pub photo_url: Option<String>,
    /// When this row was fetched from upstream.
    pub synced_at: DateTime<Utc>,
}

impl SyncRecord for Legislator {
    const DATA_TYPE: DataType = DataType::Legislators;

    fn natural_key(&self) -> String {
        format!("{:012}", self.id)
    }
}
