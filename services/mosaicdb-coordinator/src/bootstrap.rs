//! Constructs an [`AppState`] from configuration, wiring every collaborator
//! the way `akidb-api::bootstrap` assembles its `AppState` at startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mosaicdb_analytics::{AnalyticsBridge, SqliteAnalyticalEngine};
use mosaicdb_core::metrics::{ATTACHED_SHARD_COUNT, SHARD_COUNT};
use mosaicdb_core::{Embedder, MosaicConfig, MosaicResult};
use mosaicdb_executor::FanOutExecutor;
use mosaicdb_pool::{ConnectionPool, PoolConfig};
use mosaicdb_query::ResultCache;
use mosaicdb_ranker::{FreshnessScorer, FusionStrategy, PageRankScorer, Ranker, Scorer, TextMatchScorer, VectorSimilarityScorer};
use mosaicdb_routing::{HotShardCache, RoutingIndex};
use mosaicdb_search::ShardRouter;
use tracing::info;

use crate::state::AppState;

/// Builds every collaborator rooted at `storage_root` and assembles them
/// into an [`AppState`]. Shared between the HTTP service and the admin CLI
/// so both wire the coordinator identically.
pub fn bootstrap(config: MosaicConfig, storage_root: &Path, embedder: Arc<dyn Embedder>) -> MosaicResult<AppState> {
    let routing_path: PathBuf = storage_root.join("routing.db");
    info!(path = %routing_path.display(), "opening routing index");

    let routing_index = Arc::new(RoutingIndex::open(
        &routing_path,
        config.routing.page_cache_mb,
        config.routing.mmap_size_mb,
        config.routing.stat_flush_interval(),
    )?);

    let hot_cache = Arc::new(HotShardCache::new(config.routing.hot_cache_capacity));

    let pool = Arc::new(ConnectionPool::new(PoolConfig {
        max_handles_per_shard: config.pool.max_handles_per_shard,
        ..PoolConfig::default()
    }));

    let router = Arc::new(ShardRouter::new(
        Arc::clone(&hot_cache),
        Arc::clone(&routing_index),
        config.executor.scoring_workers,
    ));
    let executor = Arc::new(FanOutExecutor::new(
        Arc::clone(&pool),
        config.executor.fan_out_limit,
        config.executor.cancel_grace(),
    ));

    let scorers: Vec<Box<dyn Scorer>> = vec![
        Box::new(VectorSimilarityScorer::new(1.0)),
        Box::new(PageRankScorer::new(0.5)),
        Box::new(FreshnessScorer::new(0.25)),
        Box::new(TextMatchScorer::new(0.5)),
    ];
    let ranker = Arc::new(Ranker::new(scorers, FusionStrategy::WeightedSum, config.ranker.min_score as f32));

    let analytics_engine = SqliteAnalyticalEngine::new()?;
    let analytics = Arc::new(AnalyticsBridge::new(analytics_engine));
    let active_shards = routing_index.active_shard_ids()?;
    analytics.sync_shards(&active_shards)?;

    let result_cache = Arc::new(ResultCache::new(config.cache.max_entries, config.cache.ttl()));

    SHARD_COUNT.set(routing_index.shard_count()? as i64);
    ATTACHED_SHARD_COUNT.set(active_shards.len() as i64);

    Ok(AppState {
        config: Arc::new(config),
        routing_index,
        hot_cache,
        pool,
        router,
        executor,
        ranker,
        analytics,
        result_cache,
        embedder,
    })
}
