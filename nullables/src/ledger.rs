//! Nullable ledger: a scripted in-memory node.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use paysnap_chain::{ChainError, LedgerRpc, PostContent};
use paysnap_types::{ProofRef, RawOperation};

/// An in-memory ledger node.
///
/// Blocks and posts are scripted up front. The node can be told to fail
/// every call, or only requests for specific heights, to exercise failover
/// and retry paths.
pub struct ScriptedLedger {
    name: String,
    head: AtomicU64,
    blocks: Mutex<HashMap<u64, Vec<RawOperation>>>,
    posts: Mutex<HashMap<(String, String), PostContent>>,
    offline: AtomicBool,
    failing_heights: Mutex<HashSet<u64>>,
    block_requests: AtomicUsize,
    content_requests: AtomicUsize,
}

impl ScriptedLedger {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            head: AtomicU64::new(0),
            blocks: Mutex::new(HashMap::new()),
            posts: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            failing_heights: Mutex::new(HashSet::new()),
            block_requests: AtomicUsize::new(0),
            content_requests: AtomicUsize::new(0),
        }
    }

    pub fn set_head(&self, height: u64) {
        self.head.store(height, Ordering::SeqCst);
    }

    /// Script the operations of block `height`, raising the head if needed.
    pub fn push_block(&self, height: u64, ops: Vec<RawOperation>) {
        self.blocks.lock().unwrap().insert(height, ops);
        self.head.fetch_max(height, Ordering::SeqCst);
    }

    pub fn put_post(&self, content: PostContent) {
        let key = (content.author.clone(), content.permlink.clone());
        self.posts.lock().unwrap().insert(key, content);
    }

    /// Make every call fail (`true`) or succeed again (`false`).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make `ops_in_block(height)` fail until cleared.
    pub fn fail_height(&self, height: u64) {
        self.failing_heights.lock().unwrap().insert(height);
    }

    pub fn clear_failures(&self) {
        self.offline.store(false, Ordering::SeqCst);
        self.failing_heights.lock().unwrap().clear();
    }

    pub fn block_requests(&self) -> usize {
        self.block_requests.load(Ordering::SeqCst)
    }

    pub fn content_requests(&self) -> usize {
        self.content_requests.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), ChainError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChainError::Http {
                endpoint: self.name.clone(),
                message: "node offline".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerRpc for ScriptedLedger {
    fn name(&self) -> &str {
        &self.name
    }

    async fn head_block_number(&self) -> Result<u64, ChainError> {
        self.check_online()?;
        Ok(self.head.load(Ordering::SeqCst))
    }

    /// Unscripted heights answer with an empty list, like a node that has
    /// not seen the block yet.
    async fn ops_in_block(&self, height: u64) -> Result<Vec<RawOperation>, ChainError> {
        self.block_requests.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if self.failing_heights.lock().unwrap().contains(&height) {
            return Err(ChainError::Rpc {
                endpoint: self.name.clone(),
                code: -32000,
                message: format!("block {height} unavailable"),
            });
        }
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&height)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_content(&self, post: &ProofRef) -> Result<Option<PostContent>, ChainError> {
        self.content_requests.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let key = (post.author.to_string(), post.permlink.clone());
        Ok(self.posts.lock().unwrap().get(&key).cloned())
    }
}
