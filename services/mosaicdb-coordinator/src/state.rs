//! Coordinator application state: every long-lived collaborator the HTTP
//! handlers need, constructed once at startup by [`crate::bootstrap`].

use std::collections::HashMap;
use std::sync::Arc;

use mosaicdb_analytics::{AnalyticsBridge, SqliteAnalyticalEngine};
use mosaicdb_core::metrics::SHARD_COUNT;
use mosaicdb_core::{Embedder, MosaicConfig, MosaicResult, RoutingEntry};
use mosaicdb_executor::FanOutExecutor;
use mosaicdb_pool::ConnectionPool;
use mosaicdb_query::ResultCache;
use mosaicdb_ranker::Ranker;
use mosaicdb_routing::{HotShardCache, RoutingIndex, ShardRegistration};
use mosaicdb_search::ShardRouter;

/// Shared, cheaply-cloneable handle to every coordinator collaborator.
/// Handlers never reach into a collaborator's internals directly; they go
/// through the methods this struct exposes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MosaicConfig>,
    pub routing_index: Arc<RoutingIndex>,
    pub hot_cache: Arc<HotShardCache>,
    pub pool: Arc<ConnectionPool>,
    pub router: Arc<ShardRouter>,
    pub executor: Arc<FanOutExecutor>,
    pub ranker: Arc<Ranker>,
    pub analytics: Arc<AnalyticsBridge<SqliteAnalyticalEngine>>,
    pub result_cache: Arc<ResultCache>,
    pub embedder: Arc<dyn Embedder>,
}

impl AppState {
    /// Registers (or updates) a shard, then keeps every downstream
    /// collaborator consistent: the hot cache gets the fresh entry, the
    /// analytics bridge re-syncs its attach set, and the result cache is
    /// coarsely invalidated per its own documented contract.
    pub async fn register_shard(&self, reg: ShardRegistration) -> MosaicResult<()> {
        self.routing_index.register(&reg)?;

        let centroids: HashMap<_, _> = reg.centroids.iter().cloned().map(|c| (c.level, c)).collect();
        self.hot_cache.insert(RoutingEntry {
            shard: reg.shard.clone(),
            centroids,
        });

        let active_shards = self.routing_index.active_shard_ids()?;
        self.analytics.sync_shards(&active_shards)?;
        self.result_cache.clear();

        SHARD_COUNT.set(self.routing_index.shard_count()? as i64);
        Ok(())
    }
}
