//! Nullable broadcaster: record operations without sending them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use paysnap_chain::{BroadcastReceipt, Broadcaster, ChainError};
use paysnap_types::{BroadcastOperation, KeyRole};

/// A test broadcaster that records operations instead of sending them.
///
/// Transfers and comments can be made to fail independently, so a payout
/// failure and a reply failure can be tested separately.
#[derive(Default)]
pub struct NullBroadcaster {
    sent: Mutex<Vec<(KeyRole, BroadcastOperation)>>,
    fail_transfers: AtomicBool,
    fail_comments: AtomicBool,
    seq: AtomicU64,
}

impl NullBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    pub fn fail_comments(&self, fail: bool) {
        self.fail_comments.store(fail, Ordering::SeqCst);
    }

    /// Get all successfully broadcast operations (for assertions).
    pub fn sent(&self) -> Vec<(KeyRole, BroadcastOperation)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn transfers(&self) -> Vec<BroadcastOperation> {
        self.of_kind("transfer")
    }

    pub fn comments(&self) -> Vec<BroadcastOperation> {
        self.of_kind("comment")
    }

    fn of_kind(&self, kind: &str) -> Vec<BroadcastOperation> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, op)| op.kind() == kind)
            .map(|(_, op)| op.clone())
            .collect()
    }
}

#[async_trait]
impl Broadcaster for NullBroadcaster {
    async fn broadcast(
        &self,
        operations: &[BroadcastOperation],
        key: KeyRole,
    ) -> Result<BroadcastReceipt, ChainError> {
        for op in operations {
            let failing = match op {
                BroadcastOperation::Transfer { .. } => &self.fail_transfers,
                BroadcastOperation::Comment { .. } => &self.fail_comments,
            };
            if failing.load(Ordering::SeqCst) {
                return Err(ChainError::Broadcast(format!("{} rejected", op.kind())));
            }
        }
        self.sent
            .lock()
            .unwrap()
            .extend(operations.iter().cloned().map(|op| (key, op)));
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BroadcastReceipt {
            id: format!("null-{n}"),
        })
    }
}
