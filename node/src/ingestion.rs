//! The block ingestion pipeline.
//!
//! One worker owns the cursor and the open pending set. Each step fetches
//! the block after the cursor, dispatches its operations in order, persists
//! the cursor and then sweeps the correlator. A block is never skipped: a
//! failed fetch or a failed commit retries the same height after a backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn, Instrument};

use paysnap_chain::LedgerRpc;
use paysnap_store::{CashbackStore, ProcessedOpStore};
use paysnap_types::{Clock, RawOperation};

use crate::classifier::{Classified, EventClassifier};
use crate::correlator::{Correlator, SweepReport};
use crate::cursor::{resolve_start, CursorFile};
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::notifier::{Notification, Notifier};
use crate::pending::PendingSet;
use crate::shutdown::shutdown_requested;
use crate::tracing_spans::block_ingest_span;

/// Result of one pass through fetch, dispatch and commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Block `height` was dispatched and the cursor now points at it.
    Committed {
        height: u64,
        ops: usize,
        opened: usize,
    },
    /// The next block does not exist yet.
    AtHead { head: u64 },
    /// No endpoint could serve the head or the block; the cursor did not move.
    FetchFailed { height: u64, error: String },
    /// The block was dispatched but could not be committed; it will be retried.
    CommitFailed { height: u64, error: String },
}

/// Timing knobs for [`IngestionPipeline::run`].
#[derive(Clone, Copy, Debug)]
pub struct Pacing {
    /// Wait before asking for the head again once caught up.
    pub poll_interval: Duration,
    /// Wait before retrying a failed fetch or commit.
    pub retry_backoff: Duration,
}

pub struct IngestionPipeline {
    rpc: Arc<dyn LedgerRpc>,
    classifier: EventClassifier,
    correlator: Correlator,
    store: Arc<dyn CashbackStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    metrics: NodeMetrics,
    cursor_file: CursorFile,
    cursor: u64,
    known_head: u64,
    pending: PendingSet,
}

impl IngestionPipeline {
    /// Build a pipeline positioned at the durable cursor (or the chain head
    /// when there is none).
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        rpc: Arc<dyn LedgerRpc>,
        classifier: EventClassifier,
        correlator: Correlator,
        store: Arc<dyn CashbackStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        metrics: NodeMetrics,
        cursor_file: CursorFile,
    ) -> Result<Self, NodeError> {
        let cursor = resolve_start(&cursor_file, rpc.as_ref()).await?;
        metrics.cursor_height.set(cursor as i64);
        Ok(Self {
            rpc,
            classifier,
            correlator,
            store,
            notifier,
            clock,
            metrics,
            cursor_file,
            cursor,
            known_head: cursor,
            pending: PendingSet::new(),
        })
    }

    /// Last committed height.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    /// One step followed by a sweep when the step committed a block or
    /// found nothing new.
    pub async fn tick(&mut self) -> (StepOutcome, Option<SweepReport>) {
        let outcome = self.step().await;
        let report = match outcome {
            StepOutcome::Committed { .. } | StepOutcome::AtHead { .. } => Some(self.sweep().await),
            StepOutcome::FetchFailed { .. } | StepOutcome::CommitFailed { .. } => None,
        };
        (outcome, report)
    }

    pub async fn sweep(&mut self) -> SweepReport {
        self.correlator.sweep(&mut self.pending).await
    }

    /// Fetch, dispatch and commit the block after the cursor.
    pub async fn step(&mut self) -> StepOutcome {
        let next = self.cursor + 1;

        if next > self.known_head {
            match self.rpc.head_block_number().await {
                Ok(head) => self.known_head = head,
                Err(e) => {
                    warn!(height = next, error = %e, "could not read chain head");
                    return StepOutcome::FetchFailed {
                        height: next,
                        error: e.to_string(),
                    };
                }
            }
            if next > self.known_head {
                return StepOutcome::AtHead {
                    head: self.known_head,
                };
            }
        }

        self.ingest(next).instrument(block_ingest_span(next)).await
    }

    async fn ingest(&mut self, height: u64) -> StepOutcome {
        let started = Instant::now();

        let ops = match self.rpc.ops_in_block(height).await {
            Ok(ops) => ops,
            Err(e) => {
                self.metrics.block_fetch_failures.inc();
                warn!(error = %e, "block fetch failed, will retry");
                return StepOutcome::FetchFailed {
                    height,
                    error: e.to_string(),
                };
            }
        };

        let opened = match self.dispatch(&ops) {
            Ok(opened) => opened,
            Err(e) => {
                error!(error = %e, "dispatch failed, block will be retried");
                return StepOutcome::CommitFailed {
                    height,
                    error: e.to_string(),
                };
            }
        };

        if let Err(e) = self.cursor_file.write(height) {
            error!(error = %e, "cursor write failed, block will be retried");
            return StepOutcome::CommitFailed {
                height,
                error: e.to_string(),
            };
        }
        self.cursor = height;

        self.metrics.blocks_processed.inc();
        self.metrics.cursor_height.set(height as i64);
        self.metrics
            .block_process_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        debug!(ops = ops.len(), opened, "block committed");

        StepOutcome::Committed {
            height,
            ops: ops.len(),
            opened,
        }
    }

    /// Feed every operation to the classifier in block order. Returns the
    /// number of payments opened.
    ///
    /// A store error aborts the block; re-dispatching it later is safe since
    /// the pending set ignores transfers it already holds.
    fn dispatch(&mut self, ops: &[RawOperation]) -> Result<usize, NodeError> {
        let mut opened = 0;
        for op in ops {
            match self.classifier.classify(op) {
                Classified::Payment(candidate) => {
                    if self.store.is_processed(candidate.block, &candidate.trx_id)? {
                        debug!(trx_id = %candidate.trx_id, "transfer already paid out, skipping");
                        continue;
                    }
                    let Some(generation) = self.pending.open(candidate, self.clock.now()) else {
                        debug!(trx_id = %op.trx_id, "transfer already pending");
                        continue;
                    };
                    if let Some(payment) = self.pending.get(generation) {
                        info!(
                            sender = %payment.sender,
                            store = %payment.store,
                            amount = %payment.amount,
                            memo = %payment.memo,
                            "invoice payment detected, waiting for snap"
                        );
                        self.notifier.notify(Notification::payment_opened(payment));
                    }
                    self.metrics.payments_opened.inc();
                    opened += 1;
                }
                Classified::Proof(proof) => {
                    let author = proof.author.clone();
                    let permlink = proof.permlink.clone();
                    match self.pending.attach_proof(proof) {
                        Some(_) => {
                            info!(author = %author, permlink = %permlink, "snap attached to pending payment");
                            self.metrics.proofs_attached.inc();
                        }
                        None => {
                            debug!(author = %author, permlink = %permlink, "snap without an open payment");
                        }
                    }
                }
                Classified::Ignored => {}
            }
        }
        self.metrics.pending_payments.set(self.pending.len() as i64);
        Ok(opened)
    }

    /// Drive the pipeline until `shutdown_rx` fires. Shutdown is honoured
    /// between steps, never in the middle of a block or a sweep.
    pub async fn run(mut self, pacing: Pacing, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(cursor = self.cursor, "block ingestion started");
        loop {
            if shutdown_requested(&mut shutdown_rx) {
                break;
            }
            let (outcome, _) = self.tick().await;
            let pause = match outcome {
                StepOutcome::Committed { .. } => continue,
                StepOutcome::AtHead { .. } => pacing.poll_interval,
                StepOutcome::FetchFailed { .. } | StepOutcome::CommitFailed { .. } => {
                    pacing.retry_backoff
                }
            };
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        info!(
            cursor = self.cursor,
            open = self.pending.len(),
            "block ingestion stopped"
        );
    }
}
