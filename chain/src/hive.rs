//! JSON-RPC client for a single Hive API node.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use paysnap_types::{ProofRef, RawOperation};

use crate::condenser::{parse_content, parse_head_block, parse_ops_in_block};
use crate::{ChainError, LedgerRpc, PostContent};

/// Default timeout for a single JSON-RPC request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client bound to one API node.
///
/// Wraps `reqwest::Client` with the node's URL and provides one typed method
/// per `condenser_api` call the engine needs. Failover across nodes is the
/// job of [`crate::FailoverRpc`], not of this client.
#[derive(Clone)]
pub struct HiveClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HiveClient {
    /// Create a client for `endpoint` (e.g. `https://api.hive.blog`).
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ChainError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let endpoint = endpoint.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Http {
                endpoint: endpoint.clone(),
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn http_error(&self, message: String) -> ChainError {
        ChainError::Http {
            endpoint: self.endpoint.clone(),
            message,
        }
    }

    /// Send a JSON-RPC 2.0 request and return the `result` field.
    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        debug!(endpoint = %self.endpoint, method, "rpc call");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.http_error(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    self.http_error(format!("connection failed: {e}"))
                } else {
                    self.http_error(format!("request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            return Err(self.http_error(format!("node returned HTTP {}", response.status())));
        }

        let mut json: Value = response
            .json()
            .await
            .map_err(|e| self.http_error(format!("invalid JSON response: {e}")))?;

        if let Some(err) = json.get("error") {
            return Err(ChainError::Rpc {
                endpoint: self.endpoint.clone(),
                code: err.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        json.get_mut("result")
            .map(Value::take)
            .ok_or_else(|| ChainError::Decode(format!("{method}: response has no result")))
    }
}

#[async_trait]
impl LedgerRpc for HiveClient {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn head_block_number(&self) -> Result<u64, ChainError> {
        let props = self
            .call("condenser_api.get_dynamic_global_properties", json!([]))
            .await?;
        parse_head_block(&props)
    }

    async fn ops_in_block(&self, height: u64) -> Result<Vec<RawOperation>, ChainError> {
        let result = self
            .call("condenser_api.get_ops_in_block", json!([height, false]))
            .await?;
        parse_ops_in_block(height, &result)
    }

    async fn get_content(&self, post: &ProofRef) -> Result<Option<PostContent>, ChainError> {
        let result = self
            .call(
                "condenser_api.get_content",
                json!([post.author.as_str(), post.permlink]),
            )
            .await?;
        parse_content(&result)
    }
}
