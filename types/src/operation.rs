//! Ledger operations: what the engine reads from blocks and what it broadcasts.

use serde::{Deserialize, Serialize};

use crate::AccountName;

/// One operation emitted by the ledger for a block, as delivered by the RPC layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOperation {
    /// Height of the block containing the operation.
    pub block: u64,
    /// Identifier of the enclosing transaction (all zeros for virtual operations).
    pub trx_id: String,
    pub body: OperationBody,
}

/// Kind-specific payload of a [`RawOperation`].
///
/// Only transfers and comments are interpreted; every other kind is kept as
/// [`OperationBody::Other`] so it can be counted and then discarded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationBody {
    Transfer {
        from: AccountName,
        to: AccountName,
        /// Asset string exactly as the ledger reports it, e.g. `"1.500 HBD"`.
        amount: String,
        memo: String,
    },
    Comment {
        author: AccountName,
        /// Empty for top-level posts.
        parent_author: String,
        permlink: String,
    },
    Other {
        kind: String,
    },
}

impl OperationBody {
    /// The ledger's name for this operation kind.
    pub fn kind(&self) -> &str {
        match self {
            OperationBody::Transfer { .. } => "transfer",
            OperationBody::Comment { .. } => "comment",
            OperationBody::Other { kind } => kind,
        }
    }
}

/// Reference to a social post offered as proof for a payment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofRef {
    pub author: AccountName,
    pub permlink: String,
}

impl ProofRef {
    pub fn new(author: impl Into<AccountName>, permlink: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            permlink: permlink.into(),
        }
    }

    /// Public link to the post, used in operator notifications.
    pub fn url(&self) -> String {
        format!("https://peakd.com/@{}/{}", self.author, self.permlink)
    }
}

/// An operation the engine asks the ledger to broadcast on its behalf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastOperation {
    Transfer {
        from: AccountName,
        to: AccountName,
        /// Asset notation with three decimals, e.g. `"0.075 HBD"`.
        amount: String,
        memo: String,
    },
    Comment {
        parent_author: AccountName,
        parent_permlink: String,
        author: AccountName,
        permlink: String,
        title: String,
        body: String,
        json_metadata: String,
    },
}

impl BroadcastOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            BroadcastOperation::Transfer { .. } => "transfer",
            BroadcastOperation::Comment { .. } => "comment",
        }
    }

    /// The key authority the ledger requires to sign this operation.
    pub fn required_key(&self) -> KeyRole {
        match self {
            BroadcastOperation::Transfer { .. } => KeyRole::Active,
            BroadcastOperation::Comment { .. } => KeyRole::Posting,
        }
    }
}

/// Which of the bot account's keys must sign a broadcast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    /// Funds movements.
    Active,
    /// Social operations (posts, replies).
    Posting,
}

impl KeyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyRole::Active => "active",
            KeyRole::Posting => "posting",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_requires_active_key() {
        let op = BroadcastOperation::Transfer {
            from: "paysnap".into(),
            to: "alice".into(),
            amount: "0.075 HBD".into(),
            memo: "kcs-hpos-2024-0007".into(),
        };
        assert_eq!(op.required_key(), KeyRole::Active);
        assert_eq!(op.kind(), "transfer");
    }

    #[test]
    fn other_kind_is_preserved() {
        let body = OperationBody::Other {
            kind: "producer_reward".into(),
        };
        assert_eq!(body.kind(), "producer_reward");
    }

    #[test]
    fn proof_url_points_at_post() {
        let proof = ProofRef::new("alice", "snap-123");
        assert_eq!(proof.url(), "https://peakd.com/@alice/snap-123");
    }
}
