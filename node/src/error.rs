use thiserror::Error;

/// Errors surfaced by the engine to its embedder.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store error: {0}")]
    Store(#[from] paysnap_store::StoreError),

    #[error("ledger error: {0}")]
    Chain(#[from] paysnap_chain::ChainError),

    #[error("config error: {0}")]
    Config(String),

    #[error("cursor file error: {0}")]
    Cursor(String),

    #[error("could not determine a starting block: {0}")]
    NoStartingCursor(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("logging already initialised: {0}")]
    Logging(String),

    #[error("background tasks did not stop in time")]
    ShutdownTimeout,
}
