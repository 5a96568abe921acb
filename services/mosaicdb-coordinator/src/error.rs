//! Maps [`MosaicError`] onto the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mosaicdb_core::MosaicError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError(pub MosaicError);

impl From<MosaicError> for ApiError {
    fn from(err: MosaicError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MosaicError::InvalidInput { .. } | MosaicError::ClassifierBypass { .. } => StatusCode::BAD_REQUEST,
            MosaicError::NotFound { .. } => StatusCode::NOT_FOUND,
            MosaicError::AllShardsFailed { .. } => StatusCode::BAD_GATEWAY,
            MosaicError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            MosaicError::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            MosaicError::Internal { .. } => {
                error!(error = %self.0, "internal coordinator error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}
