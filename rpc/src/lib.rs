//! Administrative HTTP surface for the Paysnap engine.
//!
//! Provides endpoints for:
//! - Liveness (`/health`)
//! - Recent paid payments from the audit log
//! - Purchase counters, newest purchase first
//! - A token-guarded counter reset
//! - Prometheus metrics
//!
//! Runs next to the ingestion worker and only touches the store through
//! single-row operations.

pub mod error;
pub mod handlers;
pub mod pagination;
pub mod server;

pub use error::RpcError;
pub use server::{router, AdminServer, AdminState};
