use thiserror::Error;

/// Failure reported by any storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("row could not be encoded or decoded: {0}")]
    Serialization(String),

    /// A stored key or row does not have the layout this build writes.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}
