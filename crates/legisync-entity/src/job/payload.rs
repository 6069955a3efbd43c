//! Typed job payload definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A hot read path the cache-warming job can pre-populate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum CacheTarget {
    /// The full legislator roster.
    LegislatorRoster,
    /// First page of bills for a year.
    BillsForYear {
        /// Year.
        year: i32,
    },
}

/// Typed payloads for known job types. Decoded once at the queue boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum JobPayload {
    /// Pre-populate hot cache entries.
    WarmCache {
        /// Entries to warm.
        targets: Vec<CacheTarget>,
    },
    /// Drop cache entries made stale by a sync.
    InvalidateCache {
        /// Glob patterns (`"bills:*"`).
        patterns: Vec<String>,
    },
    /// Ask the analytics collaborator to recompute derived data.
    RefreshAnalytics {
        /// Execution whose data changed.
        execution_id: Uuid,
    },
    /// Delete finished checkpoints past their retention window.
    CleanupCheckpoints {
        /// Retention window in days.
        older_than_days: u32,
    },
}

impl JobPayload {
    /// Dispatch key for this payload.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::WarmCache { .. } => JobKind::WarmCache,
            Self::InvalidateCache { .. } => JobKind::InvalidateCache,
            Self::RefreshAnalytics { .. } => JobKind::RefreshAnalytics,
            Self::CleanupCheckpoints { .. } => JobKind::CleanupCheckpoints,
        }
    }
}

/// Job type discriminant used to route jobs to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// See [`JobPayload::WarmCache`].
    WarmCache,
    /// See [`JobPayload::InvalidateCache`].
    InvalidateCache,
    /// See [`JobPayload::RefreshAnalytics`].
    RefreshAnalytics,
    /// See [`JobPayload::CleanupCheckpoints`].
    CleanupCheckpoints,
}

impl JobKind {
    /// Return the kind as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WarmCache => "warm_cache",
            Self::InvalidateCache => "invalidate_cache",
            Self::RefreshAnalytics => "refresh_analytics",
            Self::CleanupCheckpoints => "cleanup_checkpoints",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_tagging() {
        let payload = JobPayload::InvalidateCache {
            patterns: vec!["bills:*".into()],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["job_type"], "invalidate_cache");
        assert_eq!(payload.kind().as_str(), "invalidate_cache");
    }

    #[test]
    fn test_unknown_job_type_is_rejected() {
        let raw = serde_json::json!({"job_type": "reticulate_splines"});
        assert!(serde_json::from_value::<JobPayload>(raw).is_err());
    }
}
