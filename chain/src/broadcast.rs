//! Broadcasters: how payouts and replies leave the engine.
//!
//! Signing is not done in-process. [`RelayBroadcaster`] hands unsigned
//! operations and the key role to a signing relay that holds the bot's keys.
//! [`DryRunBroadcaster`] only logs, for staging and local runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use paysnap_types::{BroadcastOperation, KeyRole};

use crate::{BroadcastReceipt, Broadcaster, ChainError};

/// Convert an operation into the ledger's `[kind, {fields}]` pair.
pub fn operation_json(op: &BroadcastOperation) -> Result<Value, ChainError> {
    let tagged = serde_json::to_value(op).map_err(|e| ChainError::Broadcast(e.to_string()))?;
    let fields = match tagged {
        Value::Object(mut map) => map.remove(op.kind()).unwrap_or(Value::Null),
        other => other,
    };
    Ok(json!([op.kind(), fields]))
}

#[derive(Deserialize)]
struct RelayResponse {
    id: Option<String>,
    error: Option<String>,
}

/// Submits operations to an external signing relay over HTTP.
///
/// Request body: `{"operations": [[kind, {..}], ..], "key": "active"|"posting"}`.
/// The relay answers `{"id": "<trx id>"}` or `{"error": "<message>"}`.
pub struct RelayBroadcaster {
    http: reqwest::Client,
    url: String,
}

impl RelayBroadcaster {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Broadcast(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Broadcaster for RelayBroadcaster {
    async fn broadcast(
        &self,
        operations: &[BroadcastOperation],
        key: KeyRole,
    ) -> Result<BroadcastReceipt, ChainError> {
        let ops = operations
            .iter()
            .map(operation_json)
            .collect::<Result<Vec<_>, _>>()?;
        let body = json!({ "operations": ops, "key": key.as_str() });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Broadcast(format!("relay unreachable: {e}")))?;

        let status = response.status();
        let parsed: RelayResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Broadcast(format!("relay returned HTTP {status}: {e}")))?;

        if let Some(error) = parsed.error {
            warn!(key = key.as_str(), error = %error, "relay rejected broadcast");
            return Err(ChainError::Broadcast(error));
        }
        if !status.is_success() {
            return Err(ChainError::Broadcast(format!("relay returned HTTP {status}")));
        }
        let id = parsed
            .id
            .ok_or_else(|| ChainError::Broadcast("relay response missing id".into()))?;

        info!(key = key.as_str(), ops = operations.len(), trx_id = %id, "broadcast accepted");
        Ok(BroadcastReceipt { id })
    }
}

/// Logs operations instead of broadcasting them.
#[derive(Default)]
pub struct DryRunBroadcaster {
    seq: AtomicU64,
    sent: Mutex<Vec<(KeyRole, BroadcastOperation)>>,
}

impl DryRunBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything "broadcast" so far, in order.
    pub fn sent(&self) -> Vec<(KeyRole, BroadcastOperation)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Broadcaster for DryRunBroadcaster {
    async fn broadcast(
        &self,
        operations: &[BroadcastOperation],
        key: KeyRole,
    ) -> Result<BroadcastReceipt, ChainError> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        for op in operations {
            info!(key = key.as_str(), kind = op.kind(), ?op, "dry run: would broadcast");
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.extend(operations.iter().cloned().map(|op| (key, op)));
        }
        Ok(BroadcastReceipt {
            id: format!("dry-run-{n}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_json_uses_ledger_pair_shape() {
        let op = BroadcastOperation::Transfer {
            from: "paysnap".into(),
            to: "alice".into(),
            amount: "0.075 HBD".into(),
            memo: "kcs-hpos-2024-0007".into(),
        };
        let v = operation_json(&op).unwrap();
        assert_eq!(v[0], "transfer");
        assert_eq!(v[1]["to"], "alice");
        assert_eq!(v[1]["amount"], "0.075 HBD");
    }

    #[tokio::test]
    async fn dry_run_records_and_numbers_receipts() {
        let b = DryRunBroadcaster::new();
        let op = BroadcastOperation::Comment {
            parent_author: "alice".into(),
            parent_permlink: "snap-1".into(),
            author: "paysnap".into(),
            permlink: "paynsnap-1".into(),
            title: String::new(),
            body: "hi".into(),
            json_metadata: "{}".into(),
        };
        let first = b.broadcast(&[op.clone()], KeyRole::Posting).await.unwrap();
        let second = b.broadcast(&[op], KeyRole::Posting).await.unwrap();
        assert_eq!(first.id, "dry-run-1");
        assert_eq!(second.id, "dry-run-2");
        assert_eq!(b.sent().len(), 2);
        assert_eq!(b.sent()[0].0, KeyRole::Posting);
    }
}
