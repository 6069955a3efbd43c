//! Built-in job handler implementations.

pub mod analytics;
pub mod cache;
pub mod cleanup;

pub use analytics::{AnalyticsRefresher, CacheAnalyticsRefresher, RefreshAnalyticsHandler};
pub use cache::{InvalidateCacheHandler, WarmCacheHandler};
pub use cleanup::CleanupCheckpointsHandler;
