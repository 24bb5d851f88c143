//! Capability traits consumed by the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use paysnap_types::{BroadcastOperation, KeyRole, ProofRef, RawOperation};

use crate::ChainError;

/// A revenue-share entry declared on a post. `weight` is in basis points out of 10000.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub account: String,
    pub weight: u32,
}

/// The parts of a post the engine cares about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostContent {
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub parent_author: String,
    #[serde(default)]
    pub beneficiaries: Vec<Beneficiary>,
}

/// Acknowledgement returned by a [`Broadcaster`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    pub id: String,
}

/// Read access to the ledger.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Label used in logs (usually the endpoint URL).
    fn name(&self) -> &str;

    /// Height of the latest block known to the node.
    async fn head_block_number(&self) -> Result<u64, ChainError>;

    /// Every operation (real and virtual) contained in block `height`, in ledger order.
    async fn ops_in_block(&self, height: u64) -> Result<Vec<RawOperation>, ChainError>;

    /// Fetch a post. `Ok(None)` means the node answered but the post does not exist.
    async fn get_content(&self, post: &ProofRef) -> Result<Option<PostContent>, ChainError>;
}

/// Write access to the ledger.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Sign `operations` with the bot's `key` and submit them as one transaction.
    async fn broadcast(
        &self,
        operations: &[BroadcastOperation],
        key: KeyRole,
    ) -> Result<BroadcastReceipt, ChainError>;
}

#[async_trait]
impl<T: LedgerRpc + ?Sized> LedgerRpc for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn head_block_number(&self) -> Result<u64, ChainError> {
        (**self).head_block_number().await
    }

    async fn ops_in_block(&self, height: u64) -> Result<Vec<RawOperation>, ChainError> {
        (**self).ops_in_block(height).await
    }

    async fn get_content(&self, post: &ProofRef) -> Result<Option<PostContent>, ChainError> {
        (**self).get_content(post).await
    }
}

#[async_trait]
impl<T: Broadcaster + ?Sized> Broadcaster for Arc<T> {
    async fn broadcast(
        &self,
        operations: &[BroadcastOperation],
        key: KeyRole,
    ) -> Result<BroadcastReceipt, ChainError> {
        (**self).broadcast(operations, key).await
    }
}
