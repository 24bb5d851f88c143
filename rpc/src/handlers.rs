//! Admin request handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tracing::{info, Instrument};

use paysnap_store::{CounterStore, EventFilter, PaymentEventStore, StoredPaymentEvent, UserCounter};
use paysnap_types::AccountName;

use crate::error::RpcError;
use crate::pagination::LimitParams;
use crate::server::AdminState;

/// Header carrying the shared admin secret.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: u64,
    pub block: u64,
    pub trx_id: String,
    pub username: String,
    pub amount: String,
    pub memo: String,
    pub snap_permlink: Option<String>,
    pub paid: bool,
    pub reason: String,
    pub recorded_at: u64,
}

impl From<StoredPaymentEvent> for EventView {
    fn from(stored: StoredPaymentEvent) -> Self {
        let e = stored.event;
        Self {
            id: stored.id,
            block: e.block,
            trx_id: e.trx_id,
            username: e.username.to_string(),
            amount: e.amount.to_string(),
            memo: e.memo,
            snap_permlink: e.snap_permlink,
            paid: e.paid,
            reason: e.reason,
            recorded_at: e.recorded_at.as_secs(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CounterView {
    pub username: String,
    pub purchases: u32,
    pub last_purchase: Option<u64>,
}

impl From<UserCounter> for CounterView {
    fn from(c: UserCounter) -> Self {
        Self {
            username: c.username.to_string(),
            purchases: c.purchases,
            last_purchase: c.last_purchase.map(|t| t.as_secs()),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Pay n Snap cashback bot is running",
    })
}

/// Most recent paid payments, newest first.
pub async fn recent_events(
    State(state): State<Arc<AdminState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<EventView>>, RpcError> {
    let rows = state
        .store
        .recent_events(params.effective(), EventFilter::PaidOnly)?;
    Ok(Json(rows.into_iter().map(EventView::from).collect()))
}

/// Purchase counters, most recent purchase first.
pub async fn recent_counters(
    State(state): State<Arc<AdminState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<CounterView>>, RpcError> {
    let rows = state.store.recent_counters(params.effective())?;
    Ok(Json(rows.into_iter().map(CounterView::from).collect()))
}

/// Reset one account's purchase counter. Requires the admin token; with no
/// token configured the action is disabled.
pub async fn reset_counter(
    State(state): State<Arc<AdminState>>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, RpcError> {
    let span = tracing::info_span!("admin", action = "reset_counter", username = %username);
    async move {
        authorize(&state, &headers)?;
        let account = AccountName::parse(&username)
            .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
        if state.store.reset_counter(&account)? {
            info!("purchase counter reset");
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(RpcError::UserNotFound(username.clone()))
        }
    }
    .instrument(span)
    .await
}

pub async fn metrics(State(state): State<Arc<AdminState>>) -> Result<impl IntoResponse, RpcError> {
    let registry = state.registry.as_ref().ok_or(RpcError::MetricsDisabled)?;
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buf)
        .map_err(|e| RpcError::Server(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], buf))
}

fn authorize(state: &AdminState, headers: &HeaderMap) -> Result<(), RpcError> {
    let expected = state.admin_token.as_deref().ok_or(RpcError::Unauthorized)?;
    let presented = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(RpcError::Unauthorized)?;
    if presented == expected {
        Ok(())
    } else {
        Err(RpcError::Unauthorized)
    }
}
