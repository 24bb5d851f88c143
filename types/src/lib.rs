//! Fundamental types for the Paysnap cashback engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! account names, HBD amounts, timestamps, raw ledger operations, and the
//! operations the bot broadcasts back to the ledger.

pub mod account;
pub mod amount;
pub mod error;
pub mod operation;
pub mod time;

pub use account::AccountName;
pub use amount::HbdAmount;
pub use error::TypesError;
pub use operation::{BroadcastOperation, KeyRole, OperationBody, ProofRef, RawOperation};
pub use time::{Clock, SystemClock, Timestamp};
