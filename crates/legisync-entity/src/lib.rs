//! # legisync-entity
//!
//! Domain entity models for LegiSync. Orchestration entities
//! (checkpoints, executions, background jobs) carry their own lifecycle
//! rules; synchronized records (legislators, bills, expenses, votes) are
//! plain rows keyed by the upstream's natural identifiers.

pub mod checkpoint;
pub mod execution;
pub mod job;
pub mod record;
