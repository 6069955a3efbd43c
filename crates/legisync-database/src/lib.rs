//! # legisync-database
//!
//! PostgreSQL connection management, the storage ports consumed by the
//! orchestration services, and their sqlx implementations. Also provides
//! the session-scoped advisory lock used for cross-process exclusivity.

pub mod advisory_lock;
pub mod connection;
pub mod migration;
pub mod repositories;
pub mod traits;

pub use advisory_lock::PgAdvisoryLock;
pub use connection::DatabasePool;
pub use traits::{CheckpointStore, ExecutionStore, RecordFilter, RecordRepository};
