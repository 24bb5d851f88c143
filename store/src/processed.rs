//! Processed-operation markers.

use crate::StoreError;

/// Records which qualifying transfers have already been paid out.
///
/// Keys are `(block, trx_id)` pairs. A marked transfer must never open a new
/// pending payment, which keeps block replays after a restart from paying twice.
pub trait ProcessedOpStore {
    fn mark_processed(&self, block: u64, trx_id: &str) -> Result<(), StoreError>;

    fn is_processed(&self, block: u64, trx_id: &str) -> Result<bool, StoreError>;
}
