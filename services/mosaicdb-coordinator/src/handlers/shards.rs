//! `GET /shards`: the admin surface listing every registered shard.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ShardSummary {
    pub id: String,
    pub path: String,
    pub doc_count: u64,
    pub query_count: u64,
}

#[derive(Debug, Serialize)]
pub struct ShardsResponse {
    pub count: usize,
    pub shards: Vec<ShardSummary>,
}

pub async fn shards(State(state): State<AppState>) -> Result<Json<ShardsResponse>, ApiError> {
    let shards: Vec<ShardSummary> = state
        .routing_index
        .list_shards()?
        .into_iter()
        .map(|s| ShardSummary {
            id: s.id.0,
            path: s.path,
            doc_count: s.doc_count,
            query_count: s.query_count,
        })
        .collect();
    Ok(Json(ShardsResponse { count: shards.len(), shards }))
}
