//! `POST /analytics`: always executes through the federated analytics
//! bridge, regardless of how `/query` would classify the same text.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::run_analytics;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsRequest {
    pub sql: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub results: Vec<Value>,
    pub path: &'static str,
}

pub async fn analytics(State(state): State<AppState>, Json(req): Json<AnalyticsRequest>) -> Result<Json<AnalyticsResponse>, ApiError> {
    let results = run_analytics(&state, req.sql).await?;
    Ok(Json(AnalyticsResponse { results, path: "warm" }))
}
