//! `POST /query`: classifies free-form text and dispatches to whichever
//! path the classification (or an explicit `force_class` override) selects.

use axum::extract::State;
use axum::Json;
use mosaicdb_core::metrics::CLASSIFIER_DECISIONS;
use mosaicdb_core::ScoredCandidate;
use mosaicdb_query::Dispatch;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{run_analytics, run_hot_search, run_simple_sql, HotSearchParams};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    pub force_class: Option<String>,
    pub limit: Option<usize>,
    pub min_similarity: Option<f32>,
    pub shard_limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QueryResults {
    Ranked(Vec<ScoredCandidate>),
    Rows(Vec<Value>),
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub results: QueryResults,
    pub path: &'static str,
}

pub async fn query(State(state): State<AppState>, Json(req): Json<QueryRequest>) -> Result<Json<QueryResponse>, ApiError> {
    let dispatch = mosaicdb_query::dispatch(&req.sql, req.force_class.as_deref())?;

    let limit = req.limit.unwrap_or(state.config.api.default_limit);
    let min_similarity = req.min_similarity.unwrap_or(0.0);
    let shard_limit = req
        .shard_limit
        .unwrap_or(state.config.api.default_limit)
        .min(state.config.api.shard_limit_max);

    let class_label = match &dispatch {
        Dispatch::VectorSearch { .. } => "vector_search",
        Dispatch::HybridSearch { .. } => "hybrid_search",
        Dispatch::SimpleSql { .. } => "simple_sql",
        Dispatch::Analytics { .. } => "analytics",
    };
    CLASSIFIER_DECISIONS.with_label_values(&[class_label]).inc();

    let (results, path) = match dispatch {
        Dispatch::VectorSearch { semantic_text } => {
            let params = HotSearchParams {
                query_text: semantic_text,
                sql_filter: None,
                level: Default::default(),
                limit,
                min_similarity,
                shard_limit,
                query_terms: None,
            };
            (QueryResults::Ranked(run_hot_search(&state, params).await?), "hot")
        }
        Dispatch::HybridSearch { semantic_text, sql_filter } => {
            let params = HotSearchParams {
                query_text: semantic_text,
                sql_filter: Some(sql_filter),
                level: Default::default(),
                limit,
                min_similarity,
                shard_limit,
                query_terms: None,
            };
            (QueryResults::Ranked(run_hot_search(&state, params).await?), "hot")
        }
        Dispatch::SimpleSql { sql } => (QueryResults::Rows(run_simple_sql(&state, sql).await?), "warm"),
        Dispatch::Analytics { sql } => (QueryResults::Rows(run_analytics(&state, sql).await?), "warm"),
    };

    Ok(Json(QueryResponse { results, path }))
}
