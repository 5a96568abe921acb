//! `GET /metrics`: a small JSON summary alongside the Prometheus registry
//! (scraped separately via the process's own `/metrics` exporter in a full
//! deployment; this endpoint is the spec's own lightweight surface).

use axum::extract::State;
use axum::Json;
use mosaicdb_core::metrics::{ATTACHED_SHARD_COUNT, CACHE_HITS, CACHE_MISSES};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub cache_hits: i64,
    pub cache_misses: i64,
    pub shard_count: u64,
    pub attached_shard_count: i64,
}

pub async fn metrics(State(state): State<AppState>) -> Result<Json<MetricsResponse>, ApiError> {
    Ok(Json(MetricsResponse {
        cache_hits: CACHE_HITS.get(),
        cache_misses: CACHE_MISSES.get(),
        shard_count: state.routing_index.shard_count()?,
        attached_shard_count: ATTACHED_SHARD_COUNT.get(),
    }))
}
