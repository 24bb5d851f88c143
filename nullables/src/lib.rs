//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the engine (clock, ledger nodes, broadcaster,
//! storage) sits behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be scripted and made to fail on demand
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod broadcaster;
pub mod clock;
pub mod ledger;
pub mod ops;
pub mod store;

pub use broadcaster::NullBroadcaster;
pub use clock::NullClock;
pub use ledger::ScriptedLedger;
pub use store::NullStore;
