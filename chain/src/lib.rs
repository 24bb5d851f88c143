//! Ledger RPC capability for the Paysnap engine.
//!
//! The engine never talks to a ledger node directly. It consumes two traits:
//! - [`LedgerRpc`] for reads (head height, block operations, post content)
//! - [`Broadcaster`] for writes (payout transfers and reply comments)
//!
//! Concrete implementations:
//! - [`HiveClient`]: JSON-RPC over HTTP against a single API node
//! - [`FailoverRpc`]: ordered list of backends, tried in turn per call
//! - [`RelayBroadcaster`]: hands unsigned operations to an external signing relay
//! - [`DryRunBroadcaster`]: logs operations instead of broadcasting them

pub mod broadcast;
pub mod condenser;
pub mod error;
pub mod failover;
pub mod hive;
pub mod rpc;

pub use broadcast::{DryRunBroadcaster, RelayBroadcaster};
pub use error::ChainError;
pub use failover::FailoverRpc;
pub use hive::HiveClient;
pub use rpc::{Beneficiary, BroadcastReceipt, Broadcaster, LedgerRpc, PostContent};
