//! End-to-end tests for the ingestion pipeline against scripted ledger
//! nodes, an in-memory store and a recording broadcaster.

use std::sync::Arc;
use std::time::Duration;

use paysnap_chain::{FailoverRpc, LedgerRpc};
use paysnap_node::{
    CursorFile, IngestionPipeline, NodeComponents, NodeConfig, PaysnapNode, RecordingNotifier,
    StepOutcome,
};
use paysnap_nullables::{ops, NullBroadcaster, NullClock, NullStore, ScriptedLedger};
use paysnap_store::{CounterStore, ProcessedOpStore};
use paysnap_types::{AccountName, BroadcastOperation, HbdAmount};

const STORE: &str = "kcs-store";
const HUB: &str = "peak.snaps";
const MEMO: &str = "kcs-hpos-2024-0007";
const START: u64 = 99;
const DAY: u64 = 86_400;

struct Harness {
    nodes: Vec<Arc<ScriptedLedger>>,
    store: Arc<NullStore>,
    broadcaster: Arc<NullBroadcaster>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<NullClock>,
    node: PaysnapNode,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with_endpoints(1)
    }

    fn with_endpoints(count: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let nodes: Vec<Arc<ScriptedLedger>> = (0..count)
            .map(|i| {
                let node = Arc::new(ScriptedLedger::new(&format!("node-{i}")));
                node.set_head(START);
                node
            })
            .collect();
        let backends: Vec<Arc<dyn LedgerRpc>> = nodes
            .iter()
            .map(|n| n.clone() as Arc<dyn LedgerRpc>)
            .collect();

        let store = Arc::new(NullStore::new());
        let broadcaster = Arc::new(NullBroadcaster::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(NullClock::new(1_700_000_000));

        let config = NodeConfig {
            stores: vec![AccountName::new(STORE)],
            data_dir: dir.path().to_path_buf(),
            admin_enabled: false,
            poll_interval_ms: 5,
            retry_backoff_ms: 5,
            ..NodeConfig::default()
        };
        CursorFile::new(config.cursor_path()).write(START).unwrap();
        let components = NodeComponents {
            store: store.clone(),
            rpc: Arc::new(FailoverRpc::new(backends)),
            broadcaster: broadcaster.clone(),
            notifier: notifier.clone(),
            clock: clock.clone(),
        };
        let node = PaysnapNode::with_components(config, components).unwrap();

        Self {
            nodes,
            store,
            broadcaster,
            notifier,
            clock,
            node,
            _dir: dir,
        }
    }

    /// Script a block on every ledger node. A producer reward is always
    /// included so no block reads as empty.
    fn block(&self, height: u64, mut operations: Vec<paysnap_types::RawOperation>) {
        operations.push(ops::producer_reward(height));
        for node in &self.nodes {
            node.push_block(height, operations.clone());
        }
    }

    fn snap(&self, permlink: &str, weight: u32) {
        for node in &self.nodes {
            node.put_post(ops::post("alice", permlink, HUB, &[("snapnpay", weight)]));
        }
    }

    async fn pipeline(&self) -> IngestionPipeline {
        self.node.build_pipeline().await.unwrap()
    }

    fn cursor_file(&self) -> CursorFile {
        CursorFile::new(self.node.config.cursor_path())
    }

    fn purchases(&self, user: &str) -> Option<u32> {
        self.store
            .get_counter(&AccountName::new(user))
            .unwrap()
            .map(|c| c.purchases)
    }
}

fn payment(height: u64, trx_id: &str) -> paysnap_types::RawOperation {
    ops::transfer(height, trx_id, "alice", STORE, "1.500 HBD", MEMO)
}

fn proof(height: u64, trx_id: &str, permlink: &str) -> paysnap_types::RawOperation {
    ops::comment(height, trx_id, "alice", HUB, permlink)
}

async fn run_to_head(pipeline: &mut IngestionPipeline) {
    loop {
        match pipeline.tick().await.0 {
            StepOutcome::Committed { .. } => continue,
            StepOutcome::AtHead { .. } => return,
            other => panic!("unexpected step outcome: {other:?}"),
        }
    }
}

#[tokio::test]
async fn paid_purchase_sends_cashback_and_records_it() {
    let h = Harness::new();
    h.snap("snap-1", 5000);
    h.block(100, vec![payment(100, "t1")]);
    let mut pipeline = h.pipeline().await;

    let (outcome, _) = pipeline.tick().await;
    assert_eq!(
        outcome,
        StepOutcome::Committed {
            height: 100,
            ops: 2,
            opened: 1
        }
    );
    let open: Vec<_> = pipeline.pending().iter().collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].amount, HbdAmount::from_milli(1_500));

    h.block(101, vec![proof(101, "t2", "snap-1")]);
    run_to_head(&mut pipeline).await;

    assert!(pipeline.pending().is_empty());
    assert_eq!(
        h.broadcaster.transfers(),
        vec![BroadcastOperation::Transfer {
            from: "paynsnap".into(),
            to: "alice".into(),
            amount: "0.075 HBD".into(),
            memo: MEMO.into(),
        }]
    );
    assert_eq!(h.broadcaster.comments().len(), 1);

    let events = h.store.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].paid);
    assert_eq!(events[0].block, 100);
    assert_eq!(events[0].trx_id, "t1");
    assert_eq!(events[0].snap_permlink.as_deref(), Some("snap-1"));
    assert_eq!(h.purchases("alice"), Some(1));
    assert!(h.store.is_processed(100, "t1").unwrap());
    assert_eq!(h.cursor_file().read(), Some(101));

    assert_eq!(
        h.notifier.titles(),
        vec!["💳 New Payment Received", "💰 Cashback Sent!"]
    );
}

#[tokio::test]
async fn fourth_purchase_is_rejected_without_payout() {
    let h = Harness::new();
    h.store.set_purchases("alice", 3);
    h.snap("snap-1", 5000);
    h.block(100, vec![payment(100, "t1")]);
    h.block(101, vec![proof(101, "t2", "snap-1")]);

    let mut pipeline = h.pipeline().await;
    run_to_head(&mut pipeline).await;

    let events = h.store.events();
    assert_eq!(events.len(), 1);
    assert!(!events[0].paid);
    assert_eq!(events[0].reason, "exceeded daily limit");
    assert!(h.broadcaster.sent().is_empty());
    assert_eq!(h.purchases("alice"), Some(3));
}

#[tokio::test]
async fn near_miss_beneficiary_weight_is_an_invalid_proof() {
    let h = Harness::new();
    h.snap("snap-1", 4999);
    h.block(100, vec![payment(100, "t1"), proof(100, "t2", "snap-1")]);

    let mut pipeline = h.pipeline().await;
    run_to_head(&mut pipeline).await;

    let events = h.store.events();
    assert_eq!(events.len(), 1);
    assert!(!events[0].paid);
    assert_eq!(events[0].reason, "invalid proof");
    assert!(h.broadcaster.sent().is_empty());
    assert_eq!(h.purchases("alice"), None);
}

#[tokio::test]
async fn unproven_payment_times_out_exactly_once() {
    let h = Harness::new();
    h.block(100, vec![payment(100, "t1")]);
    let mut pipeline = h.pipeline().await;
    run_to_head(&mut pipeline).await;
    assert_eq!(pipeline.pending().len(), 1);

    h.clock.advance(119);
    run_to_head(&mut pipeline).await;
    assert!(h.store.events().is_empty());

    h.clock.advance(1);
    run_to_head(&mut pipeline).await;
    h.clock.advance(600);
    run_to_head(&mut pipeline).await;

    let events = h.store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, "timed out");
    assert!(!events[0].paid);
    assert!(pipeline.pending().is_empty());
}

#[tokio::test]
async fn proof_after_timeout_finds_nothing_to_attach() {
    let h = Harness::new();
    h.snap("snap-1", 5000);
    h.block(100, vec![payment(100, "t1")]);
    let mut pipeline = h.pipeline().await;
    run_to_head(&mut pipeline).await;

    h.clock.advance(120);
    run_to_head(&mut pipeline).await;
    h.block(101, vec![proof(101, "t2", "snap-1")]);
    run_to_head(&mut pipeline).await;

    let events = h.store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, "timed out");
    assert!(h.broadcaster.sent().is_empty());
}

#[tokio::test]
async fn failing_endpoint_is_skipped_for_the_next_one() {
    let h = Harness::with_endpoints(2);
    h.block(100, vec![payment(100, "t1")]);
    h.nodes[0].fail_height(100);

    let mut pipeline = h.pipeline().await;
    let (outcome, _) = pipeline.tick().await;
    assert!(matches!(outcome, StepOutcome::Committed { height: 100, .. }));
    assert_eq!(h.nodes[0].block_requests(), 1);
    assert_eq!(h.nodes[1].block_requests(), 1);
    assert_eq!(pipeline.pending().len(), 1);
}

#[tokio::test]
async fn block_is_retried_when_every_endpoint_fails() {
    let h = Harness::with_endpoints(2);
    h.block(100, vec![payment(100, "t1")]);
    for node in &h.nodes {
        node.fail_height(100);
    }

    let mut pipeline = h.pipeline().await;
    for _ in 0..3 {
        let (outcome, sweep) = pipeline.tick().await;
        assert!(matches!(outcome, StepOutcome::FetchFailed { height: 100, .. }));
        assert!(sweep.is_none());
    }
    assert_eq!(pipeline.cursor(), START);
    assert_eq!(h.cursor_file().read(), Some(START));

    for node in &h.nodes {
        node.clear_failures();
    }
    let (outcome, _) = pipeline.tick().await;
    assert!(matches!(outcome, StepOutcome::Committed { height: 100, .. }));
    assert_eq!(pipeline.cursor(), 100);
    assert_eq!(pipeline.pending().len(), 1);
}

#[tokio::test]
async fn failed_cursor_write_retries_the_same_block() {
    let h = Harness::new();
    h.block(100, vec![payment(100, "t1")]);
    let mut pipeline = h.pipeline().await;
    // A directory in the way of the temp file makes every cursor write fail.
    let blocker = h.cursor_file().path().with_extension("tmp");
    std::fs::create_dir(&blocker).unwrap();

    for _ in 0..2 {
        let (outcome, sweep) = pipeline.tick().await;
        assert!(matches!(outcome, StepOutcome::CommitFailed { height: 100, .. }));
        assert!(sweep.is_none());
        assert_eq!(pipeline.cursor(), START);
    }
    assert_eq!(h.cursor_file().read(), Some(START));
    assert_eq!(pipeline.pending().len(), 1);

    std::fs::remove_dir(&blocker).unwrap();
    let (outcome, sweep) = pipeline.tick().await;
    assert_eq!(
        outcome,
        StepOutcome::Committed {
            height: 100,
            ops: 2,
            opened: 0
        }
    );
    assert!(sweep.is_some());
    assert_eq!(h.cursor_file().read(), Some(100));
    assert_eq!(pipeline.pending().len(), 1);
    assert_eq!(h.notifier.titles(), vec!["💳 New Payment Received"]);
}

#[tokio::test]
async fn store_error_during_dispatch_retries_the_block() {
    let h = Harness::new();
    h.block(100, vec![payment(100, "t1")]);
    let mut pipeline = h.pipeline().await;
    h.store.fail_processed_lookups(true);

    let (outcome, sweep) = pipeline.tick().await;
    assert!(matches!(outcome, StepOutcome::CommitFailed { height: 100, .. }));
    assert!(sweep.is_none());
    assert!(pipeline.pending().is_empty());
    assert_eq!(pipeline.cursor(), START);
    assert_eq!(h.cursor_file().read(), Some(START));

    h.store.fail_processed_lookups(false);
    let (outcome, _) = pipeline.tick().await;
    assert_eq!(
        outcome,
        StepOutcome::Committed {
            height: 100,
            ops: 2,
            opened: 1
        }
    );
    assert_eq!(pipeline.pending().len(), 1);
    assert_eq!(h.cursor_file().read(), Some(100));
}

#[tokio::test]
async fn unreadable_counter_holds_a_proven_payment_until_the_store_recovers() {
    let h = Harness::new();
    h.snap("snap-1", 5000);
    h.block(100, vec![payment(100, "t1"), proof(100, "t2", "snap-1")]);
    h.store.fail_counter_reads(true);
    let mut pipeline = h.pipeline().await;

    run_to_head(&mut pipeline).await;
    assert_eq!(pipeline.pending().len(), 1);
    assert!(h.broadcaster.sent().is_empty());
    assert!(h.store.events().is_empty());

    h.store.fail_counter_reads(false);
    let report = pipeline.sweep().await;
    assert_eq!(report.paid, 1);
    assert_eq!(h.broadcaster.transfers().len(), 1);
    assert_eq!(h.purchases("alice"), Some(1));
}

#[tokio::test]
async fn replay_after_restart_does_not_pay_twice() {
    let h = Harness::new();
    h.snap("snap-1", 5000);
    h.block(100, vec![payment(100, "t1")]);
    h.block(101, vec![proof(101, "t2", "snap-1")]);

    let mut first = h.pipeline().await;
    run_to_head(&mut first).await;
    assert_eq!(h.broadcaster.transfers().len(), 1);
    drop(first);

    // Crash before the cursor reached the payment block.
    h.cursor_file().write(START).unwrap();
    let mut second = h.pipeline().await;
    assert_eq!(second.cursor(), START);
    run_to_head(&mut second).await;

    assert!(second.pending().is_empty());
    assert_eq!(h.broadcaster.transfers().len(), 1);
    assert_eq!(h.store.events().len(), 1);
    assert_eq!(h.purchases("alice"), Some(1));
}

#[tokio::test]
async fn replaying_a_block_yields_the_same_open_set() {
    let h = Harness::new();
    h.block(
        100,
        vec![
            payment(100, "t1"),
            ops::transfer(100, "t2", "bob", STORE, "3.000 HBD", "kcs-hpos-2024-0008"),
            ops::transfer(100, "t3", "carol", "elsewhere", "1.000 HBD", MEMO),
            ops::transfer(100, "t4", "dave", STORE, "1.000 HBD", "thanks!"),
        ],
    );

    let snapshot = |p: &IngestionPipeline| {
        p.pending()
            .iter()
            .map(|x| (x.sender.clone(), x.amount, x.memo.clone(), x.trx_id.clone()))
            .collect::<Vec<_>>()
    };

    let mut first = h.pipeline().await;
    first.step().await;
    let a = snapshot(&first);

    // The first run committed block 100; rewind so a fresh pipeline reads it again.
    h.cursor_file().write(START).unwrap();
    let mut replay = h.pipeline().await;
    replay.step().await;
    let b = snapshot(&replay);

    assert_eq!(a.len(), 2);
    assert_eq!(a, b);
}

#[tokio::test]
async fn already_processed_transfer_never_reopens() {
    let h = Harness::new();
    h.store.mark_processed(100, "t1").unwrap();
    h.block(100, vec![payment(100, "t1")]);

    let mut pipeline = h.pipeline().await;
    let (outcome, _) = pipeline.tick().await;
    assert!(matches!(outcome, StepOutcome::Committed { opened: 0, .. }));
    assert!(pipeline.pending().is_empty());
    assert!(h.notifier.titles().is_empty());
}

#[tokio::test]
async fn only_the_first_proof_post_is_validated() {
    let h = Harness::new();
    h.snap("snap-bad", 1000);
    h.snap("snap-good", 5000);
    h.block(
        100,
        vec![
            payment(100, "t1"),
            proof(100, "t2", "snap-bad"),
            proof(100, "t3", "snap-good"),
        ],
    );

    let mut pipeline = h.pipeline().await;
    run_to_head(&mut pipeline).await;

    let events = h.store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, "invalid proof");
    assert_eq!(events[0].snap_permlink.as_deref(), Some("snap-bad"));
    assert!(h.broadcaster.sent().is_empty());
}

#[tokio::test]
async fn proof_from_another_account_does_not_attach() {
    let h = Harness::new();
    h.block(
        100,
        vec![
            payment(100, "t1"),
            ops::comment(100, "t2", "mallory", HUB, "snap-1"),
        ],
    );
    let mut pipeline = h.pipeline().await;
    run_to_head(&mut pipeline).await;

    let open: Vec<_> = pipeline.pending().iter().collect();
    assert_eq!(open.len(), 1);
    assert!(open[0].proof.is_none());
}

/// The "daily" limit is a cumulative purchase counter. Nothing resets it as
/// days pass; only an operator reset does.
#[tokio::test]
async fn daily_limit_counts_cumulatively_without_a_day_reset() {
    let h = Harness::new();
    let mut pipeline = h.pipeline().await;
    let mut height = START;
    let expected = ["0.075 HBD", "0.105 HBD", "0.150 HBD"];

    for (i, amount) in expected.iter().enumerate() {
        let permlink = format!("snap-{i}");
        h.snap(&permlink, 5000);
        height += 1;
        h.block(
            height,
            vec![
                payment(height, &format!("pay-{i}")),
                proof(height, &format!("post-{i}"), &permlink),
            ],
        );
        run_to_head(&mut pipeline).await;
        let transfers = h.broadcaster.transfers();
        match transfers.last() {
            Some(BroadcastOperation::Transfer { amount: sent, .. }) => assert_eq!(sent, amount),
            other => panic!("expected a payout, got {other:?}"),
        }
        h.clock.advance(2 * DAY);
    }
    assert_eq!(h.purchases("alice"), Some(3));

    h.snap("snap-3", 5000);
    height += 1;
    h.block(height, vec![payment(height, "pay-3"), proof(height, "post-3", "snap-3")]);
    run_to_head(&mut pipeline).await;

    let events = h.store.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[3].reason, "exceeded daily limit");
    assert_eq!(h.broadcaster.transfers().len(), 3);

    // An operator reset restarts the tiers.
    assert!(h.store.reset_counter(&AccountName::new("alice")).unwrap());
    h.snap("snap-4", 5000);
    height += 1;
    h.block(height, vec![payment(height, "pay-4"), proof(height, "post-4", "snap-4")]);
    run_to_head(&mut pipeline).await;
    assert_eq!(h.broadcaster.transfers().len(), 4);
    assert_eq!(h.purchases("alice"), Some(1));
}

#[tokio::test]
async fn failed_payout_is_recorded_unpaid_and_not_retried() {
    let h = Harness::new();
    h.broadcaster.fail_transfers(true);
    h.snap("snap-1", 5000);
    h.block(100, vec![payment(100, "t1"), proof(100, "t2", "snap-1")]);

    let mut pipeline = h.pipeline().await;
    run_to_head(&mut pipeline).await;
    h.clock.advance(300);
    run_to_head(&mut pipeline).await;

    let events = h.store.events();
    assert_eq!(events.len(), 1);
    assert!(!events[0].paid);
    assert!(events[0].reason.starts_with("payout broadcast failed"));
    assert!(pipeline.pending().is_empty());
    assert_eq!(h.purchases("alice"), None);
    assert!(!h.store.is_processed(100, "t1").unwrap());
}

#[tokio::test]
async fn failed_reply_keeps_the_payout() {
    let h = Harness::new();
    h.broadcaster.fail_comments(true);
    h.snap("snap-1", 5000);
    h.block(100, vec![payment(100, "t1"), proof(100, "t2", "snap-1")]);

    let mut pipeline = h.pipeline().await;
    run_to_head(&mut pipeline).await;

    let events = h.store.events();
    assert!(events[0].paid);
    assert_eq!(h.broadcaster.transfers().len(), 1);
    assert!(h.broadcaster.comments().is_empty());
    assert_eq!(h.purchases("alice"), Some(1));
}

#[tokio::test]
async fn corrupt_cursor_file_restarts_from_chain_head() {
    let h = Harness::new();
    std::fs::write(h.node.config.cursor_path(), "garbage").unwrap();
    h.nodes[0].set_head(5_000);
    let pipeline = h.pipeline().await;
    assert_eq!(pipeline.cursor(), 5_000);
}

#[tokio::test]
async fn no_cursor_and_no_endpoint_is_fatal() {
    let h = Harness::new();
    std::fs::remove_file(h.node.config.cursor_path()).unwrap();
    h.nodes[0].set_offline(true);
    assert!(h.node.build_pipeline().await.is_err());
}

#[tokio::test]
async fn spawned_node_processes_blocks_until_stopped() {
    let mut h = Harness::new();
    h.snap("snap-1", 5000);
    h.block(100, vec![payment(100, "t1"), proof(100, "t2", "snap-1")]);

    h.node.spawn().await.unwrap();
    let paid = tokio::time::timeout(Duration::from_secs(5), async {
        while h.store.events().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(paid.is_ok(), "node never paid the purchase");
    h.node.stop().await.unwrap();

    assert!(h.store.events()[0].paid);
    assert_eq!(h.cursor_file().read(), Some(100));
}
