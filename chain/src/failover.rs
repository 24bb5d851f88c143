//! Multi-endpoint failover.
//!
//! [`FailoverRpc`] holds an ordered list of backends and, for every call,
//! tries them in order until one succeeds. It knows nothing about block
//! heights or cursors, so it can be exercised with mock backends alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use paysnap_types::{ProofRef, RawOperation};

use crate::{ChainError, HiveClient, LedgerRpc, PostContent};

pub struct FailoverRpc {
    backends: Vec<Arc<dyn LedgerRpc>>,
    failovers: AtomicU64,
}

impl FailoverRpc {
    pub fn new(backends: Vec<Arc<dyn LedgerRpc>>) -> Self {
        Self {
            backends,
            failovers: AtomicU64::new(0),
        }
    }

    /// Build one [`HiveClient`] per endpoint, preserving order.
    pub fn from_endpoints(
        endpoints: &[String],
        timeout: std::time::Duration,
    ) -> Result<Self, ChainError> {
        let backends = endpoints
            .iter()
            .map(|url| {
                HiveClient::with_timeout(url.clone(), timeout)
                    .map(|client| Arc::new(client) as Arc<dyn LedgerRpc>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(backends))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Number of times a backend failed and the next one was tried.
    pub fn failover_count(&self) -> u64 {
        self.failovers.load(Ordering::Relaxed)
    }

    fn attempts(&self, op: &'static str) -> Result<Attempts<'_>, ChainError> {
        if self.backends.is_empty() {
            return Err(ChainError::NoEndpoints);
        }
        Ok(Attempts {
            op,
            failovers: &self.failovers,
            attempted: 0,
            last_error: String::new(),
        })
    }
}

/// Bookkeeping for one logical call spread over several backends.
struct Attempts<'a> {
    op: &'static str,
    failovers: &'a AtomicU64,
    attempted: usize,
    last_error: String,
}

impl Attempts<'_> {
    fn failed(&mut self, endpoint: &str, error: String) {
        warn!(endpoint, op = self.op, error = %error, "endpoint failed, trying next");
        self.failovers.fetch_add(1, Ordering::Relaxed);
        self.attempted += 1;
        self.last_error = format!("{endpoint}: {error}");
    }

    fn served(&self, endpoint: &str) {
        if self.attempted > 0 {
            debug!(endpoint, op = self.op, skipped = self.attempted, "served by fallback endpoint");
        }
    }

    fn exhausted(self) -> ChainError {
        ChainError::AllEndpointsFailed {
            attempted: self.attempted,
            last_error: self.last_error,
        }
    }
}

#[async_trait]
impl LedgerRpc for FailoverRpc {
    fn name(&self) -> &str {
        "failover"
    }

    async fn head_block_number(&self) -> Result<u64, ChainError> {
        let mut attempts = self.attempts("head_block_number")?;
        for backend in &self.backends {
            match backend.head_block_number().await {
                Ok(head) => {
                    attempts.served(backend.name());
                    return Ok(head);
                }
                Err(e) => attempts.failed(backend.name(), e.to_string()),
            }
        }
        Err(attempts.exhausted())
    }

    /// A block always contains at least its virtual operations, so an empty
    /// answer means the node has not caught up and the next one is asked.
    async fn ops_in_block(&self, height: u64) -> Result<Vec<RawOperation>, ChainError> {
        let mut attempts = self.attempts("ops_in_block")?;
        for backend in &self.backends {
            match backend.ops_in_block(height).await {
                Ok(ops) if !ops.is_empty() => {
                    attempts.served(backend.name());
                    return Ok(ops);
                }
                Ok(_) => attempts.failed(backend.name(), format!("empty result for block {height}")),
                Err(e) => attempts.failed(backend.name(), e.to_string()),
            }
        }
        Err(attempts.exhausted())
    }

    async fn get_content(&self, post: &ProofRef) -> Result<Option<PostContent>, ChainError> {
        let mut attempts = self.attempts("get_content")?;
        for backend in &self.backends {
            match backend.get_content(post).await {
                Ok(content) => {
                    attempts.served(backend.name());
                    return Ok(content);
                }
                Err(e) => attempts.failed(backend.name(), e.to_string()),
            }
        }
        Err(attempts.exhausted())
    }
}
