//! Vote entity model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SyncRecord;
use crate::checkpoint::DataType;

/// A roll-call vote session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Vote {
    /// Upstream vote ID (e.g. `"2345678-90"`).
    pub id: String,
    /// Date of the vote.
    pub date: NaiveDate,
    /// Registration timestamp.
    pub registered_at: Option<DateTime<Utc>>,
    /// Deliberating body acronym.
    pub body: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Whether the matter was approved.
    pub approved: Option<bool>,
    /// URI of the proposition voted on.
    pub bill_uri: Option<String>,
    /// When this row was fetched from upstream.
    pub synced_at: DateTime<Utc>,
}

impl SyncRecord for Vote {
    const DATA_TYPE: DataType = DataType::Votes;

    fn natural_key(&self) -> String {
        format!("{}|{}", self.date, self.id)
    }
}
