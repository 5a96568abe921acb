//! `POST /documents`: accepted for ingest but opaque to the coordinator
//! core. Ingestion writes shard files directly; the coordinator only ever
//! learns about them via `register_shard`.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
}

pub async fn documents(Json(_body): Json<Value>) -> (StatusCode, Json<AcceptedResponse>) {
    (StatusCode::ACCEPTED, Json(AcceptedResponse { status: "accepted" }))
}
