//! Backfill checkpoint entities.

pub mod model;
pub mod status;

pub use model::{Checkpoint, CheckpointMetadata, CheckpointProgress};
pub use status::{CheckpointStatus, DataType};
