//! Centralized configuration for the coordinator.
//!
//! Supports env-var overrides, reasonable defaults, and configuration
//! validation, following the same `config`-crate layering the rest of the
//! pack uses: environment variables take precedence over an optional file,
//! which takes precedence over hardcoded defaults.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure for the coordinator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MosaicConfig {
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub ranker: RankerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl MosaicConfig {
    /// Loads configuration from multiple sources with precedence:
    /// 1. Environment variables (`MOSAICDB_*`, highest priority)
    /// 2. Config file named by `MOSAICDB_CONFIG`
    /// 3. `./config/mosaicdb.yaml`
    /// 4. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        builder = Self::set_defaults(builder)?;

        if let Ok(path) = std::env::var("MOSAICDB_CONFIG") {
            builder = builder.add_source(File::with_name(&path).required(false));
        }
        builder = builder.add_source(File::with_name("./config/mosaicdb").required(false));

        builder = builder.add_source(
            Environment::with_prefix("MOSAICDB")
                .separator("__")
                .try_parsing(true),
        );

        let config: MosaicConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("routing.dimension", 384)?
            .set_default("routing.hot_cache_capacity", 10_000)?
            .set_default("routing.page_cache_mb", 128)?
            .set_default("routing.mmap_size_mb", 256)?
            .set_default("routing.stat_flush_interval_ms", 1000)?
            .set_default("pool.max_handles_per_shard", 5)?
            .set_default("executor.fan_out_limit", 16)?
            .set_default("executor.per_shard_limit_multiplier", 3)?
            .set_default("executor.timeout_ms", 5000)?
            .set_default("executor.cancel_grace_ms", 200)?
            .set_default("executor.scoring_workers", 10)?
            .set_default("executor.scoring_queue_depth", 256)?
            .set_default("ranker.pagerank_max", 100.0)?
            .set_default("ranker.freshness_half_life_days", 30.0)?
            .set_default("ranker.rrf_k", 60)?
            .set_default("ranker.min_score", 0.0)?
            .set_default("cache.max_entries", 10_000)?
            .set_default("cache.ttl_seconds", 300)?
            .set_default("api.shard_limit_max", 200)?
            .set_default("api.default_limit", 10)?
    }

    /// Validates configuration values, rejecting combinations that can never
    /// produce a usable coordinator.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.routing.dimension == 0 {
            return Err(ConfigError::Message(
                "routing.dimension must be > 0".to_string(),
            ));
        }
        if self.pool.max_handles_per_shard == 0 {
            return Err(ConfigError::Message(
                "pool.max_handles_per_shard must be > 0".to_string(),
            ));
        }
        if self.executor.fan_out_limit == 0 {
            return Err(ConfigError::Message(
                "executor.fan_out_limit must be > 0".to_string(),
            ));
        }
        if self.executor.scoring_workers == 0 {
            return Err(ConfigError::Message(
                "executor.scoring_workers must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Routing index (C3) and hot-shard LRU (C4) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Embedding dimension `D`.
    pub dimension: usize,
    /// Hot-shard LRU capacity `C`.
    pub hot_cache_capacity: usize,
    /// Page-cache size hint in MB for the routing index database.
    pub page_cache_mb: u64,
    /// Memory-mapped I/O size hint in MB.
    pub mmap_size_mb: u64,
    /// How often the batched access-stat writer flushes.
    pub stat_flush_interval_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            hot_cache_capacity: 10_000,
            page_cache_mb: 128,
            mmap_size_mb: 256,
            stat_flush_interval_ms: 1000,
        }
    }
}

impl RoutingConfig {
    /// Flush interval as a [`Duration`].
    #[must_use]
    pub fn stat_flush_interval(&self) -> Duration {
        Duration::from_millis(self.stat_flush_interval_ms)
    }
}

/// Per-shard connection pool (C5) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Maximum pooled handles per shard `P`.
    pub max_handles_per_shard: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_handles_per_shard: 5,
        }
    }
}

/// Fan-out executor (C7) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    /// Maximum shards queried concurrently, `F`.
    pub fan_out_limit: usize,
    /// Per-shard result limit is `limit * per_shard_limit_multiplier`.
    pub per_shard_limit_multiplier: usize,
    /// Overall query deadline `T`, in milliseconds.
    pub timeout_ms: u64,
    /// Grace period for a sub-task to observe cancellation before its
    /// handle is considered tainted.
    pub cancel_grace_ms: u64,
    /// Size of the bounded scoring worker pool `W`.
    pub scoring_workers: usize,
    /// Depth of the bounded queue in front of the scoring workers.
    pub scoring_queue_depth: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            fan_out_limit: 16,
            per_shard_limit_multiplier: 3,
            timeout_ms: 5000,
            cancel_grace_ms: 200,
            scoring_workers: 10,
            scoring_queue_depth: 256,
        }
    }
}

impl ExecutorConfig {
    /// Overall deadline as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cancellation grace period as a [`Duration`].
    #[must_use]
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

/// Ranker (C8) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankerConfig {
    /// Normalization constant `PR_MAX` for the pagerank scorer.
    pub pagerank_max: f64,
    /// Half-life `H` (days) for the freshness scorer.
    pub freshness_half_life_days: f64,
    /// Constant `k` for reciprocal-rank fusion.
    pub rrf_k: u32,
    /// Default `min_score` threshold applied after fusion.
    pub min_score: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            pagerank_max: 100.0,
            freshness_half_life_days: 30.0,
            rrf_k: 60,
            min_score: 0.0,
        }
    }
}

/// Result cache (C13) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries.
    pub max_entries: u64,
    /// Entry time-to-live in seconds.
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_seconds: 300,
        }
    }
}

impl CacheConfig {
    /// TTL as a [`Duration`].
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Hard ceiling on a caller-supplied `shard_limit`.
    pub shard_limit_max: usize,
    /// Default `limit` when a request omits one.
    pub default_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            shard_limit_max: 200,
            default_limit: 10,
        }
    }
}
