//! Shared query-execution paths, reused by the `/search`, `/search/hybrid`,
//! `/query`, and `/analytics` handlers so each one stays a thin
//! parse-request/format-response shim.

use chrono::Utc;
use mosaicdb_core::{Level, MosaicResult, ScoredCandidate};
use mosaicdb_core::metrics::{ATTACHED_SHARD_COUNT, CACHE_HITS, CACHE_MISSES, FAN_OUT_DURATION, SHARD_UNAVAILABLE};
use mosaicdb_executor::FanOutQuery;
use mosaicdb_query::{fingerprint, CacheKeyInput};
use mosaicdb_ranker::RankingContext;
use mosaicdb_search::{extract_terms, RouteRequest};
use serde_json::Value;
use tracing::warn;

use crate::state::AppState;

/// Parameters for a single hot vector/hybrid search, already extracted from
/// an HTTP request or a parsed [`mosaicdb_query::Dispatch`].
pub struct HotSearchParams {
    pub query_text: String,
    pub sql_filter: Option<String>,
    pub level: Level,
    pub limit: usize,
    pub min_similarity: f32,
    pub shard_limit: usize,
    pub query_terms: Option<Vec<String>>,
}

/// Runs the full hot path: cache lookup, embed, route, fan out, rank, cache
/// store. Used for both plain vector search and hybrid (vector + SQL
/// filter) search — they differ only in whether `sql_filter` is set.
pub async fn run_hot_search(state: &AppState, params: HotSearchParams) -> MosaicResult<Vec<ScoredCandidate>> {
    let query_terms = params
        .query_terms
        .clone()
        .unwrap_or_else(|| extract_terms(&params.query_text));

    let options_canonical = format!(
        "level={}&limit={}&min_similarity={}&shard_limit={}&filter={}",
        params.level.as_str(),
        params.limit,
        params.min_similarity,
        params.shard_limit,
        params.sql_filter.as_deref().unwrap_or(""),
    );
    let cache_key = fingerprint(&CacheKeyInput {
        query_text: &params.query_text,
        options_canonical: &options_canonical,
        ranker_identity: "default",
    });

    if let Some(cached) = state.result_cache.get(&cache_key).await {
        CACHE_HITS.inc();
        if let Ok(results) = serde_json::from_slice::<Vec<ScoredCandidate>>(&cached) {
            return Ok(results);
        }
    }
    CACHE_MISSES.inc();

    let query_vector = match state.embedder.encode(&params.query_text).await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "embedder failed, falling back to zero vector");
            vec![0.0; state.embedder.dimension()]
        }
    };

    let routed = state
        .router
        .route(RouteRequest {
            level: params.level,
            query_vector: query_vector.clone(),
            query_terms: query_terms.clone(),
            min_similarity: params.min_similarity,
            limit: params.shard_limit,
        })
        .await?;

    if routed.is_empty() {
        return Ok(Vec::new());
    }

    let per_shard_limit = params.limit * state.config.executor.per_shard_limit_multiplier;
    let fan_out_started = std::time::Instant::now();
    let outcome = state
        .executor
        .execute(
            &routed,
            FanOutQuery {
                level: params.level,
                query_vector,
                sql_filter: params.sql_filter,
                per_shard_limit,
                timeout: state.config.executor.timeout(),
            },
        )
        .await?;

    let outcome_label = if outcome.failed_shards.is_empty() { "success" } else { "partial" };
    FAN_OUT_DURATION
        .with_label_values(&[outcome_label])
        .observe(fan_out_started.elapsed().as_secs_f64());

    if !outcome.failed_shards.is_empty() {
        SHARD_UNAVAILABLE.inc_by(outcome.failed_shards.len() as i64);
    }

    let mut ctx = RankingContext::new(query_terms, Utc::now());
    ctx.pagerank_max = state.config.ranker.pagerank_max as f32;
    ctx.freshness_half_life_days = state.config.ranker.freshness_half_life_days as f32;

    let mut scored = state.ranker.rank(outcome.candidates, &ctx);
    scored.truncate(params.limit);

    if let Ok(bytes) = serde_json::to_vec(&scored) {
        state.result_cache.set(cache_key, bytes).await;
    }

    Ok(scored)
}

/// Runs `sql` against every active shard independently, concatenating rows
/// with no fusion or aggregate merge (the `simple_sql` dispatch path).
pub async fn run_simple_sql(state: &AppState, sql: String) -> MosaicResult<Vec<Value>> {
    let shards = state.routing_index.active_shard_ids()?;
    mosaicdb_query::execute_federated_simple(std::sync::Arc::clone(&state.pool), &shards, sql).await
}

/// Runs `sql` through the federated analytics bridge, re-syncing the
/// attach set against the currently active shards first.
pub async fn run_analytics(state: &AppState, sql: String) -> MosaicResult<Vec<Value>> {
    let shards = state.routing_index.active_shard_ids()?;
    state.analytics.sync_shards(&shards)?;
    ATTACHED_SHARD_COUNT.set(shards.len() as i64);
    state.analytics.execute_federated(&sql)
}
