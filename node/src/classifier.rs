//! Event classification for raw ledger operations.
//!
//! Classification looks at one operation at a time and never at history, so
//! replaying a block always yields the same events.

use std::collections::BTreeSet;

use tracing::warn;

use paysnap_types::{AccountName, HbdAmount, OperationBody, ProofRef, RawOperation};

use crate::config::NodeConfig;

/// Prefix every invoice memo starts with.
pub const INVOICE_PREFIX: &str = "kcs-hpos-";

/// A transfer into a store account carrying an invoice memo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentCandidate {
    pub sender: AccountName,
    pub store: AccountName,
    pub amount: HbdAmount,
    pub memo: String,
    pub block: u64,
    pub trx_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classified {
    Payment(PaymentCandidate),
    Proof(ProofRef),
    Ignored,
}

/// Decides whether an operation is a qualifying payment or proof post.
#[derive(Clone, Debug)]
pub struct EventClassifier {
    stores: BTreeSet<AccountName>,
    proof_hub: AccountName,
}

impl EventClassifier {
    pub fn new(stores: impl IntoIterator<Item = AccountName>, proof_hub: AccountName) -> Self {
        Self {
            stores: stores.into_iter().collect(),
            proof_hub,
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(
            config.stores.iter().cloned(),
            config.proof_hub_account.clone(),
        )
    }

    pub fn is_store(&self, account: &AccountName) -> bool {
        self.stores.contains(account)
    }

    pub fn classify(&self, op: &RawOperation) -> Classified {
        match &op.body {
            OperationBody::Transfer {
                from,
                to,
                amount,
                memo,
            } => {
                if !self.is_store(to) || !is_invoice_memo(memo) {
                    return Classified::Ignored;
                }
                match HbdAmount::parse_asset(amount) {
                    Ok(amount) => Classified::Payment(PaymentCandidate {
                        sender: from.clone(),
                        store: to.clone(),
                        amount,
                        memo: memo.clone(),
                        block: op.block,
                        trx_id: op.trx_id.clone(),
                    }),
                    Err(e) => {
                        warn!(block = op.block, trx_id = %op.trx_id, error = %e, "invoice transfer with unreadable amount");
                        Classified::Ignored
                    }
                }
            }
            OperationBody::Comment {
                author,
                parent_author,
                permlink,
            } if self.proof_hub == parent_author.as_str() => {
                Classified::Proof(ProofRef::new(author.clone(), permlink.clone()))
            }
            _ => Classified::Ignored,
        }
    }
}

/// `kcs-hpos-<token>` where the token is one or more ASCII letters, digits or `-`.
pub fn is_invoice_memo(memo: &str) -> bool {
    memo.strip_prefix(INVOICE_PREFIX).is_some_and(|token| {
        !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

/// Invoice number shown to the customer.
///
/// `kcs-hpos-2024-0007` becomes `2024-0007`; any other memo is shown as is.
pub fn invoice_display(memo: &str) -> &str {
    let Some(token) = memo.strip_prefix(INVOICE_PREFIX) else {
        return memo;
    };
    let four_digits = |s: &str| s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit());
    match token.split_once('-') {
        Some((a, b)) if four_digits(a) && four_digits(b) => token,
        _ => memo,
    }
}
