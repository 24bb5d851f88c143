//! Pre-built [`tracing::Span`] constructors for recurring engine work.
//!
//! Consistent span names and fields make it easy to follow one block or one
//! payment through the logs.

use tracing::{info_span, Span};

use paysnap_types::AccountName;

/// Span covering fetch, dispatch and commit of a single block.
pub fn block_ingest_span(height: u64) -> Span {
    info_span!("block_ingest", height)
}

/// Span covering one correlator sweep over the open payments.
pub fn sweep_span(open: usize) -> Span {
    info_span!("sweep", open)
}

/// Span covering proof validation for one payment.
pub fn validate_span(sender: &AccountName, permlink: &str) -> Span {
    info_span!("validate", sender = %sender, permlink = %permlink)
}

/// Span covering payout, reply and bookkeeping for one payment.
pub fn disburse_span(sender: &AccountName, memo: &str) -> Span {
    info_span!("disburse", sender = %sender, memo = %memo)
}
