//! Admin surface error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("metrics are not enabled")]
    MetricsDisabled,

    #[error("store error: {0}")]
    Store(String),

    #[error("server error: {0}")]
    Server(String),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::Unauthorized => StatusCode::UNAUTHORIZED,
            RpcError::UserNotFound(_) => StatusCode::NOT_FOUND,
            RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::MetricsDisabled => StatusCode::NOT_FOUND,
            RpcError::Store(_) | RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<paysnap_store::StoreError> for RpcError {
    fn from(e: paysnap_store::StoreError) -> Self {
        RpcError::Store(e.to_string())
    }
}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        RpcError::Server(e.to_string())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "admin request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
