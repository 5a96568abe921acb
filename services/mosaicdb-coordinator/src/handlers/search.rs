//! `POST /search` and `POST /search/hybrid`: the hot vector and hybrid
//! search paths.

use axum::extract::State;
use axum::Json;
use mosaicdb_core::{Level, ScoredCandidate};
use serde::{Deserialize, Serialize};

use crate::engine::{run_hot_search, HotSearchParams};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub min_similarity: Option<f32>,
    pub shard_limit: Option<usize>,
    pub level: Option<Level>,
    pub query_terms: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct HybridSearchRequest {
    pub query: String,
    #[serde(rename = "where")]
    pub filter: String,
    pub limit: Option<usize>,
    pub min_similarity: Option<f32>,
    pub shard_limit: Option<usize>,
    pub level: Option<Level>,
    pub query_terms: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredCandidate>,
    pub path: &'static str,
}

pub async fn search(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Result<Json<SearchResponse>, ApiError> {
    let params = HotSearchParams {
        query_text: req.query,
        sql_filter: None,
        level: req.level.unwrap_or_default(),
        limit: req.limit.unwrap_or(state.config.api.default_limit),
        min_similarity: req.min_similarity.unwrap_or(0.0),
        shard_limit: req
            .shard_limit
            .unwrap_or(state.config.api.default_limit)
            .min(state.config.api.shard_limit_max),
        query_terms: req.query_terms,
    };
    let results = run_hot_search(&state, params).await?;
    Ok(Json(SearchResponse { results, path: "hot" }))
}

pub async fn search_hybrid(
    State(state): State<AppState>,
    Json(req): Json<HybridSearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let params = HotSearchParams {
        query_text: req.query,
        sql_filter: Some(req.filter),
        level: req.level.unwrap_or_default(),
        limit: req.limit.unwrap_or(state.config.api.default_limit),
        min_similarity: req.min_similarity.unwrap_or(0.0),
        shard_limit: req
            .shard_limit
            .unwrap_or(state.config.api.default_limit)
            .min(state.config.api.shard_limit_max),
        query_terms: req.query_terms,
    };
    let results = run_hot_search(&state, params).await?;
    Ok(Json(SearchResponse { results, path: "hot" }))
}
