//! The sweep that resolves open pending payments.
//!
//! Every resolution appends exactly one audit row and removes the payment
//! from the open set. Payments that are neither resolvable nor expired stay
//! open untouched until the next sweep.

use std::sync::Arc;

use tracing::{debug, error, info, warn, Instrument};

use paysnap_store::{CashbackStore, CounterStore, PaymentEvent, PaymentEventStore};
use paysnap_types::{Clock, Timestamp};

use crate::disbursement::{paid_reason, Disbursement, DisbursementOutcome};
use crate::metrics::NodeMetrics;
use crate::notifier::{Notification, Notifier};
use crate::pending::{PendingPayment, PendingSet};
use crate::snap_validator::SnapValidator;
use crate::tracing_spans::sweep_span;

pub const REASON_DAILY_LIMIT: &str = "exceeded daily limit";
pub const REASON_INVALID_PROOF: &str = "invalid proof";
pub const REASON_TIMED_OUT: &str = "timed out";
pub const REASON_NO_CASHBACK: &str = "no cashback tier";

/// Counts from one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub paid: usize,
    pub rejected: usize,
    pub still_open: usize,
}

/// Terminal outcome of one pending payment.
struct Resolution {
    paid: bool,
    reason: String,
    metric_label: Option<&'static str>,
}

impl Resolution {
    fn paid(reason: String) -> Self {
        Self {
            paid: true,
            reason,
            metric_label: None,
        }
    }

    fn rejected(reason: impl Into<String>, metric_label: &'static str) -> Self {
        Self {
            paid: false,
            reason: reason.into(),
            metric_label: Some(metric_label),
        }
    }
}

pub struct Correlator {
    store: Arc<dyn CashbackStore>,
    validator: SnapValidator,
    disbursement: Disbursement,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    metrics: NodeMetrics,
    daily_limit: u32,
    timeout_secs: u64,
}

impl Correlator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn CashbackStore>,
        validator: SnapValidator,
        disbursement: Disbursement,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        metrics: NodeMetrics,
        daily_limit: u32,
        timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            validator,
            disbursement,
            notifier,
            clock,
            metrics,
            daily_limit,
            timeout_secs,
        }
    }

    /// Resolve what can be resolved, oldest payment first.
    pub async fn sweep(&self, pending: &mut PendingSet) -> SweepReport {
        let span = sweep_span(pending.len());
        self.sweep_inner(pending).instrument(span).await
    }

    async fn sweep_inner(&self, pending: &mut PendingSet) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.clock.now();

        for generation in pending.generations() {
            let Some(payment) = pending.get(generation).cloned() else {
                continue;
            };
            let Some(resolution) = self.resolve(&payment, now).await else {
                report.still_open += 1;
                continue;
            };

            pending.remove(generation);
            if resolution.paid {
                report.paid += 1;
            } else {
                report.rejected += 1;
            }
            if let Some(label) = resolution.metric_label {
                self.metrics.record_rejection(label);
            }
            self.record(&payment, &resolution, now);
        }

        self.metrics.pending_payments.set(pending.len() as i64);
        if report.paid + report.rejected > 0 {
            debug!(
                paid = report.paid,
                rejected = report.rejected,
                still_open = report.still_open,
                "sweep finished"
            );
        }
        report
    }

    /// `None` keeps the payment open for the next sweep.
    async fn resolve(&self, payment: &PendingPayment, now: Timestamp) -> Option<Resolution> {
        let purchase_num = match self.store.next_purchase_num(&payment.sender) {
            Ok(n) => n,
            Err(e) => {
                if payment.proof.is_none() && self.expired(payment, now) {
                    return Some(self.time_out(payment));
                }
                warn!(
                    sender = %payment.sender,
                    age_secs = payment.created_at.elapsed_since(now),
                    error = %e,
                    "could not read purchase counter, payment stays open"
                );
                return None;
            }
        };

        if purchase_num > self.daily_limit {
            info!(sender = %payment.sender, purchase_num, limit = self.daily_limit, "daily cashback limit reached");
            self.notifier
                .notify(Notification::daily_limit(payment, purchase_num, self.daily_limit));
            return Some(Resolution::rejected(REASON_DAILY_LIMIT, "daily_limit"));
        }

        let Some(proof) = &payment.proof else {
            return self.expired(payment, now).then(|| self.time_out(payment));
        };

        if !self.validator.validate(proof, &payment.sender).await {
            self.notifier.notify(Notification::invalid_snap(payment, proof));
            return Some(Resolution::rejected(REASON_INVALID_PROOF, "invalid_proof"));
        }

        let resolution = match self.disbursement.disburse(payment, proof, purchase_num).await {
            DisbursementOutcome::Paid {
                cashback, reply_id, ..
            } => {
                self.metrics.payouts_sent.inc();
                self.metrics.payout_milli_hbd.inc_by(cashback.milli());
                if reply_id.is_none() {
                    self.metrics.broadcast_failures.inc();
                }
                self.notifier.notify(Notification::cashback_sent(
                    payment,
                    proof,
                    cashback,
                    purchase_num,
                ));
                Resolution::paid(paid_reason(cashback))
            }
            DisbursementOutcome::NothingToPay => {
                Resolution::rejected(REASON_NO_CASHBACK, "no_cashback")
            }
            DisbursementOutcome::PayoutFailed(e) => {
                self.metrics.broadcast_failures.inc();
                Resolution::rejected(format!("payout broadcast failed: {e}"), "broadcast_failed")
            }
        };
        Some(resolution)
    }

    fn expired(&self, payment: &PendingPayment, now: Timestamp) -> bool {
        payment.created_at.has_expired(self.timeout_secs, now)
    }

    fn time_out(&self, payment: &PendingPayment) -> Resolution {
        info!(sender = %payment.sender, memo = %payment.memo, "payment timed out waiting for proof");
        self.notifier
            .notify(Notification::timed_out(payment, self.timeout_secs));
        Resolution::rejected(REASON_TIMED_OUT, "timed_out")
    }

    fn record(&self, payment: &PendingPayment, resolution: &Resolution, now: Timestamp) {
        let event = PaymentEvent {
            block: payment.block,
            trx_id: payment.trx_id.clone(),
            username: payment.sender.clone(),
            amount: payment.amount,
            memo: payment.memo.clone(),
            snap_permlink: payment.proof.as_ref().map(|p| p.permlink.clone()),
            paid: resolution.paid,
            reason: resolution.reason.clone(),
            recorded_at: now,
        };
        if let Err(e) = self.store.append_event(&event) {
            error!(
                block = payment.block,
                trx_id = %payment.trx_id,
                reason = %resolution.reason,
                error = %e,
                "failed to append audit row"
            );
        }
    }
}
