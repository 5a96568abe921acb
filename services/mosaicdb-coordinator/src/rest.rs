//! Builds the coordinator's `axum` router, mirroring the teacher's
//! `rest::build_router` + `TraceLayer` wiring.

use axum::extract::Request;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};

use crate::handlers;
use crate::state::AppState;

/// Builds the `axum` router hosting the REST facade for the coordinator.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/search", post(handlers::search::search))
        .route("/search/hybrid", post(handlers::search::search_hybrid))
        .route("/query", post(handlers::query::query))
        .route("/analytics", post(handlers::analytics::analytics))
        .route("/documents", post(handlers::documents::documents))
        .route("/shards", get(handlers::shards::shards))
        .route("/metrics", get(handlers::metrics::metrics))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    info_span!("http_request", method = %request.method(), uri = %request.uri())
                })
                .on_request(|_request: &Request, _span: &Span| {
                    tracing::debug!("started processing request");
                })
                .on_response(|response: &Response, latency: std::time::Duration, _span: &Span| {
                    let status = response.status();
                    let latency_ms = latency.as_millis();
                    if status.is_server_error() {
                        tracing::error!(status = %status, latency_ms, "request failed with server error");
                    } else if status.is_client_error() {
                        tracing::warn!(status = %status, latency_ms, "request failed with client error");
                    } else {
                        tracing::info!(status = %status, latency_ms, "request completed");
                    }
                })
                .on_failure(|failure_class: ServerErrorsFailureClass, latency: std::time::Duration, _span: &Span| {
                    tracing::error!(failure_class = ?failure_class, latency_ms = latency.as_millis(), "request failed");
                }),
        )
}
