//! Ledger RPC error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("HTTP error from {endpoint}: {message}")]
    Http { endpoint: String, message: String },

    #[error("RPC error {code} from {endpoint}: {message}")]
    Rpc {
        endpoint: String,
        code: i64,
        message: String,
    },

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("all {attempted} endpoints failed; last error: {last_error}")]
    AllEndpointsFailed { attempted: usize, last_error: String },

    #[error("no endpoints configured")]
    NoEndpoints,

    #[error("broadcast failed: {0}")]
    Broadcast(String),
}
