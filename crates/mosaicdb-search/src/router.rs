//! Shard router (C6): scores and ranks candidate shards for a query vector.
//!
//! Candidate gathering favors the hot cache, falling back to the durable
//! routing index when the cache doesn't yield enough hits. Scoring work
//! (cosine similarity against each candidate's centroid) runs on a bounded
//! pool of blocking tasks, matching the "bounded worker pool" resource model
//! rather than spawning one task per shard.

use std::sync::Arc;

use mosaicdb_core::metrics::BLOOM_PRUNED;
use mosaicdb_core::vector::{cosine_similarity, norm};
use mosaicdb_core::{BloomFilter, Level, MosaicResult, RoutingEntry, ShardId};
use mosaicdb_routing::{HotShardCache, RoutingIndex};
use tokio::sync::Semaphore;
use tracing::debug;

/// A shard scored against a query vector, prior to truncation to `limit`.
#[derive(Debug, Clone)]
pub struct RoutedShard {
    pub shard_id: ShardId,
    pub path: String,
    pub query_count: u64,
    pub similarity: f32,
}

/// Configuration for a single routing pass.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub level: Level,
    pub query_vector: Vec<f32>,
    pub query_terms: Vec<String>,
    pub min_similarity: f32,
    pub limit: usize,
}

/// Routes queries to candidate shards (C6), backed by the hot cache and
/// routing index, with a bounded worker pool for similarity scoring.
pub struct ShardRouter {
    cache: Arc<HotShardCache>,
    index: Arc<RoutingIndex>,
    scoring_permits: Arc<Semaphore>,
}

impl ShardRouter {
    /// Creates a router with a scoring pool of `workers` concurrent
    /// blocking tasks (default `W = 10` per the resource model).
    #[must_use]
    pub fn new(cache: Arc<HotShardCache>, index: Arc<RoutingIndex>, workers: usize) -> Self {
        Self {
            cache,
            index,
            scoring_permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Executes the five-step routing algorithm: candidate gathering, bloom
    /// any-match filtering, bounded-pool similarity scoring, tie-broken
    /// sort, and buffered access-stat updates.
    pub async fn route(&self, req: RouteRequest) -> MosaicResult<Vec<RoutedShard>> {
        let candidates = self.gather_candidates(req.level, req.limit)?;
        let survivors = filter_by_bloom(candidates, &req.query_terms);

        let mut scored = self
            .score_candidates(survivors, req.level, req.query_vector, req.min_similarity)
            .await?;

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.query_count.cmp(&a.query_count))
                .then_with(|| a.shard_id.0.cmp(&b.shard_id.0))
        });
        scored.truncate(req.limit);

        for shard in &scored {
            let _ = self.index.update_access_stats(shard.shard_id.clone(), 1);
        }

        Ok(scored)
    }

    /// Step 1: fetch candidates from the hot cache, augmenting from the
    /// durable index when the cache yields fewer than `limit` hits.
    fn gather_candidates(&self, level: Level, limit: usize) -> MosaicResult<Vec<RoutingEntry>> {
        let mut candidates = self.cache.shards_at_level(level);
        if candidates.len() < limit {
            let from_index = self.index.active_shards_at_level(level)?;
            let mut seen: std::collections::HashSet<ShardId> =
                candidates.iter().map(|c| c.shard.id.clone()).collect();
            for entry in from_index {
                if seen.insert(entry.shard.id.clone()) {
                    self.cache.insert(entry.clone());
                    candidates.push(entry);
                }
            }
        }
        Ok(candidates)
    }

    /// Step 3: scores survivors against `query_vector` using the bounded
    /// scoring pool, discarding anything below `min_similarity`.
    async fn score_candidates(
        &self,
        survivors: Vec<RoutingEntry>,
        level: Level,
        query_vector: Vec<f32>,
        min_similarity: f32,
    ) -> MosaicResult<Vec<RoutedShard>> {
        let query_vector = Arc::new(query_vector);
        let mut tasks = Vec::with_capacity(survivors.len());

        for entry in survivors {
            let permits = Arc::clone(&self.scoring_permits);
            let query_vector = Arc::clone(&query_vector);
            tasks.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.expect("semaphore not closed");
                tokio::task::spawn_blocking(move || score_one(entry, level, &query_vector, min_similarity))
                    .await
                    .expect("scoring task panicked")
            }));
        }

        let mut scored = Vec::with_capacity(tasks.len());
        for task in tasks {
            if let Some(candidate) = task.await.expect("scoring join failed") {
                scored.push(candidate);
            }
        }
        Ok(scored)
    }
}

fn score_one(entry: RoutingEntry, level: Level, query_vector: &[f32], min_similarity: f32) -> Option<RoutedShard> {
    let centroid = entry.centroids.get(&level)?;
    let query_norm = norm(query_vector);
    let similarity = cosine_similarity(query_vector, query_norm, &centroid.centroid, centroid.centroid_norm).ok()?;
    if similarity < min_similarity {
        return None;
    }
    Some(RoutedShard {
        shard_id: entry.shard.id,
        path: entry.shard.path,
        query_count: entry.shard.query_count,
        similarity,
    })
}

/// Step 2: keeps a shard only if at least one query term is a possible
/// member of its bloom filter (any-match: queries are disjunctive over
/// terms). Shards with no bloom filter, or queries with no terms, always
/// pass through.
fn filter_by_bloom(candidates: Vec<RoutingEntry>, query_terms: &[String]) -> Vec<RoutingEntry> {
    if query_terms.is_empty() {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|entry| match &entry.shard.bloom_filter {
            None => true,
            Some(bytes) => match BloomFilter::from_bytes(bytes) {
                Some(bloom) => {
                    let hit = bloom.contains_any(query_terms);
                    if !hit {
                        debug!(shard = %entry.shard.id, "pruned by bloom filter");
                        BLOOM_PRUNED.inc();
                    }
                    hit
                }
                None => true,
            },
        })
        .collect()
}
