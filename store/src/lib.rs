//! Abstract storage traits for the Paysnap cashback engine.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod counter;
pub mod error;
pub mod payment_event;
pub mod processed;

pub use counter::{CounterStore, UserCounter};
pub use error::StoreError;
pub use payment_event::{EventFilter, PaymentEvent, PaymentEventStore, StoredPaymentEvent};
pub use processed::ProcessedOpStore;

/// Everything the ingestion engine persists, behind one handle.
///
/// Implemented automatically for any type that implements all three stores.
pub trait CashbackStore:
    CounterStore + PaymentEventStore + ProcessedOpStore + Send + Sync
{
}

impl<T> CashbackStore for T where
    T: CounterStore + PaymentEventStore + ProcessedOpStore + Send + Sync
{
}
