//! Cache tier configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache provider type: `"memory"`, `"redis"`, or `"layered"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Backend used as the shared L2 tier when `provider = "layered"`:
    /// `"redis"` or `"memory"`.
    #[serde(default = "default_l2_backend")]
    pub l2_backend: String,
    /// Default TTL for cached entries in seconds.
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: u64,
    /// Redis-specific cache configuration.
    #[serde(default)]
    pub redis: RedisCacheConfig,
    /// In-memory (moka) backend configuration.
    #[serde(default)]
    pub memory: MemoryCacheConfig,
    /// In-process L1 tier configuration.
    #[serde(default)]
    pub l1: L1CacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            l2_backend: default_l2_backend(),
            default_ttl_seconds: default_ttl(),
            redis: RedisCacheConfig::default(),
            memory: MemoryCacheConfig::default(),
            l1: L1CacheConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Validate tier sizing.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.l1.max_items == 0 {
            return Err(AppError::configuration("cache.l1.max_items must be > 0"));
        }
        if !(self.l1.eviction_fraction > 0.0 && self.l1.eviction_fraction <= 1.0) {
            return Err(AppError::configuration(
                "cache.l1.eviction_fraction must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// Redis cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key prefix for all LegiSync cache keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// In-memory (moka) backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries in the cache.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Upper bound on entry lifetime in seconds.
    #[serde(default = "default_memory_ttl")]
    pub time_to_live_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            time_to_live_seconds: default_memory_ttl(),
        }
    }
}

/// In-process L1 tier of the layered cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L1CacheConfig {
    /// Hard upper bound on the number of L1 entries.
    #[serde(default = "default_l1_max_items")]
    pub max_items: usize,
    /// TTL applied to values promoted from L2 (their L2 TTL is unknown).
    #[serde(default = "default_l1_ttl")]
    pub default_ttl_seconds: u64,
    /// Interval between expired-entry sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Fraction of `max_items` evicted when an insert overflows.
    #[serde(default = "default_eviction_fraction")]
    pub eviction_fraction: f64,
}

impl Default for L1CacheConfig {
    fn default() -> Self {
        Self {
            max_items: default_l1_max_items(),
            default_ttl_seconds: default_l1_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
            eviction_fraction: default_eviction_fraction(),
        }
    }
}

fn default_provider() -> String {
    "layered".to_string()
}

fn default_l2_backend() -> String {
    "redis".to_string()
}

fn default_ttl() -> u64 {
    300
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "legisync:".to_string()
}

fn default_max_capacity() -> u64 {
    50_000
}

fn default_memory_ttl() -> u64 {
    3600
}

fn default_l1_max_items() -> usize {
    10_000
}

fn default_l1_ttl() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_eviction_fraction() -> f64 {
    0.10
}
