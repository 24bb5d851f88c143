//! Append-only payment audit log.

use crate::StoreError;
use paysnap_types::{AccountName, HbdAmount, Timestamp};
use serde::{Deserialize, Serialize};

/// Outcome of one resolved pending payment.
///
/// Written exactly once per resolution and never updated; the log alone is
/// enough to reconstruct what the engine did with every qualifying transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub block: u64,
    pub trx_id: String,
    pub username: AccountName,
    pub amount: HbdAmount,
    pub memo: String,
    pub snap_permlink: Option<String>,
    pub paid: bool,
    pub reason: String,
    pub recorded_at: Timestamp,
}

/// A [`PaymentEvent`] together with its position in the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPaymentEvent {
    pub id: u64,
    #[serde(flatten)]
    pub event: PaymentEvent,
}

/// Which rows a listing should return.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EventFilter {
    #[default]
    All,
    PaidOnly,
}

impl EventFilter {
    pub fn matches(&self, event: &PaymentEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::PaidOnly => event.paid,
        }
    }
}

/// Trait for the payment audit log.
pub trait PaymentEventStore {
    /// Append an event and return its sequence id (strictly increasing).
    fn append_event(&self, event: &PaymentEvent) -> Result<u64, StoreError>;

    /// Most recent events first, at most `limit` rows matching `filter`.
    fn recent_events(
        &self,
        limit: usize,
        filter: EventFilter,
    ) -> Result<Vec<StoredPaymentEvent>, StoreError>;

    /// Total number of rows in the log.
    fn event_count(&self) -> Result<u64, StoreError>;
}
