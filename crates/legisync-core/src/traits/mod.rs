//! Core traits defined in `legisync-core` and implemented by other crates.

pub mod cache;
pub mod lock;

pub use cache::{CacheJson, CacheProvider};
pub use lock::{AdvisoryLock, LockKey};
