//! Axum-based admin server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use paysnap_store::CashbackStore;

use crate::error::RpcError;
use crate::handlers;

/// Shared state for every admin handler.
pub struct AdminState {
    pub store: Arc<dyn CashbackStore>,
    /// Secret for mutating actions. `None` disables them.
    pub admin_token: Option<String>,
    /// Registry served at `/metrics`, if any.
    pub registry: Option<prometheus::Registry>,
}

pub fn router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/events", get(handlers::recent_events))
        .route("/counters", get(handlers::recent_counters))
        .route("/counters/:username/reset", post(handlers::reset_counter))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

pub struct AdminServer {
    pub port: u16,
    pub state: Arc<AdminState>,
}

impl AdminServer {
    pub fn new(port: u16, state: Arc<AdminState>) -> Self {
        Self { port, state }
    }

    /// Bind and serve until the task is dropped or the listener fails.
    pub async fn start(&self) -> Result<(), RpcError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "admin server listening");
        axum::serve(listener, router(Arc::clone(&self.state))).await?;
        Ok(())
    }
}
