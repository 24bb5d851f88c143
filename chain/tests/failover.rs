//! Failover behaviour against in-process backends that fail on demand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use paysnap_chain::{ChainError, FailoverRpc, LedgerRpc, PostContent};
use paysnap_types::{OperationBody, ProofRef, RawOperation};

enum Behaviour {
    Fail,
    Empty,
    Serve,
}

struct MockBackend {
    name: String,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl MockBackend {
    fn new(name: &str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn outcome<T>(&self, value: T, empty: T) -> Result<T, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Fail => Err(ChainError::Http {
                endpoint: self.name.clone(),
                message: "connection refused".into(),
            }),
            Behaviour::Empty => Ok(empty),
            Behaviour::Serve => Ok(value),
        }
    }
}

#[async_trait]
impl LedgerRpc for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn head_block_number(&self) -> Result<u64, ChainError> {
        self.outcome(100, 100)
    }

    async fn ops_in_block(&self, height: u64) -> Result<Vec<RawOperation>, ChainError> {
        let op = RawOperation {
            block: height,
            trx_id: format!("{}-trx", self.name),
            body: OperationBody::Other {
                kind: "producer_reward".into(),
            },
        };
        self.outcome(vec![op], Vec::new())
    }

    async fn get_content(&self, post: &ProofRef) -> Result<Option<PostContent>, ChainError> {
        let content = PostContent {
            author: post.author.to_string(),
            permlink: post.permlink.clone(),
            parent_author: String::new(),
            beneficiaries: Vec::new(),
        };
        self.outcome(Some(content), None)
    }
}

fn failover(backends: &[Arc<MockBackend>]) -> FailoverRpc {
    FailoverRpc::new(
        backends
            .iter()
            .map(|b| b.clone() as Arc<dyn LedgerRpc>)
            .collect(),
    )
}

#[tokio::test]
async fn first_healthy_backend_serves_the_call() {
    let a = MockBackend::new("a", Behaviour::Fail);
    let b = MockBackend::new("b", Behaviour::Serve);
    let c = MockBackend::new("c", Behaviour::Serve);
    let rpc = failover(&[a.clone(), b.clone(), c.clone()]);

    let ops = rpc.ops_in_block(7).await.unwrap();
    assert_eq!(ops[0].trx_id, "b-trx");
    assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    assert_eq!(rpc.failover_count(), 1);
}

#[tokio::test]
async fn empty_block_result_moves_to_next_backend() {
    let a = MockBackend::new("a", Behaviour::Empty);
    let b = MockBackend::new("b", Behaviour::Serve);
    let rpc = failover(&[a.clone(), b]);

    let ops = rpc.ops_in_block(7).await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].block, 7);
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn missing_post_is_an_answer_not_a_failure() {
    let a = MockBackend::new("a", Behaviour::Empty);
    let b = MockBackend::new("b", Behaviour::Serve);
    let rpc = failover(&[a, b.clone()]);

    let content = rpc.get_content(&ProofRef::new("alice", "snap")).await.unwrap();
    assert_eq!(content, None);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn exhausting_every_backend_reports_all_failed() {
    let a = MockBackend::new("a", Behaviour::Fail);
    let b = MockBackend::new("b", Behaviour::Empty);
    let rpc = failover(&[a, b]);

    match rpc.ops_in_block(9).await {
        Err(ChainError::AllEndpointsFailed {
            attempted,
            last_error,
        }) => {
            assert_eq!(attempted, 2);
            assert!(last_error.starts_with("b:"), "{last_error}");
        }
        other => panic!("expected AllEndpointsFailed, got {other:?}"),
    }
    assert!(rpc.head_block_number().await.is_err());
}

#[tokio::test]
async fn no_backends_is_its_own_error() {
    let rpc = FailoverRpc::new(Vec::new());
    assert!(rpc.is_empty());
    assert!(matches!(
        rpc.head_block_number().await,
        Err(ChainError::NoEndpoints)
    ));
}
