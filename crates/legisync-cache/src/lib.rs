//! # legisync-cache
//!
//! Read-path caching for synchronized records and analytics. `cache.provider`
//! picks one of:
//!
//! - **memory**: a single moka tier, per-entry TTL
//! - **redis**: a single shared Redis tier under a key prefix
//! - **layered**: [`MultiLevelCache`], a bounded in-process L1 in front of
//!   moka or Redis (`cache.l2_backend`) as L2
//!
//! Keys are built by [`keys`] so writers and invalidators agree on them.

pub mod keys;
pub mod layered;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use layered::MultiLevelCache;
pub use provider::CacheManager;
