//! Background job domain entities.

pub mod model;
pub mod payload;
pub mod status;

pub use model::Job;
pub use payload::{CacheTarget, JobKind, JobPayload};
pub use status::JobPriority;
