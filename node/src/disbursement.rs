//! Payout side effects for a validated payment.
//!
//! Order: payout transfer, reply comment, processed-op marker, counter
//! upsert. The audit row is written by the caller once the outcome is known.

use std::sync::Arc;

use tracing::{error, info, warn, Instrument};

use paysnap_chain::Broadcaster;
use paysnap_store::{CashbackStore, CounterStore, ProcessedOpStore, UserCounter};
use paysnap_types::{AccountName, BroadcastOperation, Clock, HbdAmount, KeyRole, ProofRef, Timestamp};

use crate::cashback::CashbackPolicy;
use crate::classifier::invoice_display;
use crate::pending::PendingPayment;
use crate::tracing_spans::disburse_span;

/// What happened when a validated payment was disbursed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisbursementOutcome {
    /// The cashback transfer was accepted. A failed reply does not undo this.
    Paid {
        cashback: HbdAmount,
        transfer_id: String,
        reply_id: Option<String>,
    },
    /// The purchase tier pays nothing, so nothing was broadcast.
    NothingToPay,
    /// The cashback transfer was rejected; no bookkeeping was written.
    PayoutFailed(String),
}

pub struct Disbursement {
    broadcaster: Arc<dyn Broadcaster>,
    store: Arc<dyn CashbackStore>,
    clock: Arc<dyn Clock>,
    policy: CashbackPolicy,
    bot_account: AccountName,
}

impl Disbursement {
    pub fn new(
        broadcaster: Arc<dyn Broadcaster>,
        store: Arc<dyn CashbackStore>,
        clock: Arc<dyn Clock>,
        policy: CashbackPolicy,
        bot_account: AccountName,
    ) -> Self {
        Self {
            broadcaster,
            store,
            clock,
            policy,
            bot_account,
        }
    }

    pub async fn disburse(
        &self,
        payment: &PendingPayment,
        proof: &ProofRef,
        purchase_num: u32,
    ) -> DisbursementOutcome {
        self.disburse_inner(payment, proof, purchase_num)
            .instrument(disburse_span(&payment.sender, &payment.memo))
            .await
    }

    async fn disburse_inner(
        &self,
        payment: &PendingPayment,
        proof: &ProofRef,
        purchase_num: u32,
    ) -> DisbursementOutcome {
        let cashback = self.policy.calculate(purchase_num, payment.amount);
        if cashback.is_zero() {
            info!(purchase_num, "no cashback for this purchase tier");
            return DisbursementOutcome::NothingToPay;
        }

        let transfer = payout_transfer(&self.bot_account, payment, cashback);
        let transfer_id = match self.broadcaster.broadcast(&[transfer], KeyRole::Active).await {
            Ok(receipt) => receipt.id,
            Err(e) => {
                error!(error = %e, cashback = %cashback, "cashback transfer failed");
                return DisbursementOutcome::PayoutFailed(e.to_string());
            }
        };
        info!(cashback = %cashback, trx_id = %transfer_id, purchase_num, "cashback sent");

        let now = self.clock.now();
        let reply = reply_comment(&self.bot_account, payment, proof, cashback, now);
        let reply_id = match self.broadcaster.broadcast(&[reply], KeyRole::Posting).await {
            Ok(receipt) => Some(receipt.id),
            Err(e) => {
                warn!(error = %e, "reply comment failed; payout stands");
                None
            }
        };

        // Payout is final from here on; store errors are only logged.
        if let Err(e) = self.store.mark_processed(payment.block, &payment.trx_id) {
            error!(error = %e, block = payment.block, trx_id = %payment.trx_id, "failed to mark operation processed");
        }
        let counter = UserCounter {
            username: payment.sender.clone(),
            purchases: purchase_num,
            last_purchase: Some(now),
        };
        if let Err(e) = self.store.put_counter(&counter) {
            error!(error = %e, purchase_num, "failed to update purchase counter");
        }

        DisbursementOutcome::Paid {
            cashback,
            transfer_id,
            reply_id,
        }
    }
}

/// Cashback transfer back to the payer, carrying the original memo.
pub fn payout_transfer(
    bot_account: &AccountName,
    payment: &PendingPayment,
    cashback: HbdAmount,
) -> BroadcastOperation {
    BroadcastOperation::Transfer {
        from: bot_account.clone(),
        to: payment.sender.clone(),
        amount: cashback.to_asset_string(),
        memo: payment.memo.clone(),
    }
}

/// Acknowledgement reply under the proof post.
pub fn reply_comment(
    bot_account: &AccountName,
    payment: &PendingPayment,
    proof: &ProofRef,
    cashback: HbdAmount,
    now: Timestamp,
) -> BroadcastOperation {
    BroadcastOperation::Comment {
        parent_author: proof.author.clone(),
        parent_permlink: proof.permlink.clone(),
        author: bot_account.clone(),
        permlink: format!("paynsnap-{}", now.as_secs()),
        title: String::new(),
        body: reply_body(&payment.sender, cashback, &payment.memo),
        json_metadata: "{}".to_string(),
    }
}

pub fn reply_body(user: &AccountName, cashback: HbdAmount, memo: &str) -> String {
    format!(
        "Hello {user}, thank you for using Snap and Pay. I just sent you {:.2} HBD back to you for the invoice {}.",
        cashback.to_f64(),
        invoice_display(memo)
    )
}

/// Audit reason for a paid payment.
pub fn paid_reason(cashback: HbdAmount) -> String {
    format!("Snap detected, paid {:.2} HBD", cashback.to_f64())
}
