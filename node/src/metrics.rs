//! Prometheus metrics for the Paysnap node.
//!
//! The [`NodeMetrics`] struct owns a dedicated [`Registry`] that the admin
//! `/metrics` endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

/// Central collection of all node-level Prometheus metrics.
#[derive(Clone)]
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Blocks fetched, dispatched and committed.
    pub blocks_processed: IntCounter,
    /// Block fetches that no endpoint could serve.
    pub block_fetch_failures: IntCounter,
    /// Qualifying transfers that opened a pending payment.
    pub payments_opened: IntCounter,
    /// Proof posts attached to a pending payment.
    pub proofs_attached: IntCounter,
    /// Cashback transfers broadcast successfully.
    pub payouts_sent: IntCounter,
    /// Sum of all cashback sent, in milli-HBD.
    pub payout_milli_hbd: IntCounter,
    /// Resolved payments that were not paid, by reason.
    pub rejections: IntCounterVec,
    /// Payout or reply broadcasts that failed.
    pub broadcast_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Payments currently waiting for a proof or a sweep.
    pub pending_payments: IntGauge,
    /// Last committed block height.
    pub cursor_height: IntGauge,
    /// Calls moved on to the next ledger endpoint after a failure.
    pub endpoint_failovers: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent fetching and dispatching one block, in milliseconds.
    pub block_process_time_ms: Histogram,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let blocks_processed = register_int_counter_with_registry!(
            Opts::new("paysnap_blocks_processed_total", "Total blocks committed"),
            registry
        )?;

        let block_fetch_failures = register_int_counter_with_registry!(
            Opts::new(
                "paysnap_block_fetch_failures_total",
                "Block fetches that failed on every endpoint"
            ),
            registry
        )?;

        let payments_opened = register_int_counter_with_registry!(
            Opts::new(
                "paysnap_payments_opened_total",
                "Qualifying invoice payments detected"
            ),
            registry
        )?;

        let proofs_attached = register_int_counter_with_registry!(
            Opts::new(
                "paysnap_proofs_attached_total",
                "Proof posts attached to a pending payment"
            ),
            registry
        )?;

        let payouts_sent = register_int_counter_with_registry!(
            Opts::new("paysnap_payouts_sent_total", "Cashback transfers broadcast"),
            registry
        )?;

        let payout_milli_hbd = register_int_counter_with_registry!(
            Opts::new(
                "paysnap_payout_milli_hbd_total",
                "Total cashback sent, in milli-HBD"
            ),
            registry
        )?;

        let rejections = register_int_counter_vec_with_registry!(
            Opts::new(
                "paysnap_rejections_total",
                "Resolved payments that were not paid"
            ),
            &["reason"],
            registry
        )?;

        let broadcast_failures = register_int_counter_with_registry!(
            Opts::new(
                "paysnap_broadcast_failures_total",
                "Payout or reply broadcasts that failed"
            ),
            registry
        )?;

        let pending_payments = register_int_gauge_with_registry!(
            Opts::new("paysnap_pending_payments", "Payments waiting for resolution"),
            registry
        )?;

        let cursor_height = register_int_gauge_with_registry!(
            Opts::new("paysnap_cursor_height", "Last committed block height"),
            registry
        )?;

        let endpoint_failovers = register_int_gauge_with_registry!(
            Opts::new(
                "paysnap_endpoint_failovers",
                "Ledger calls retried on the next endpoint"
            ),
            registry
        )?;

        // 1 ms to ~16 s.
        let block_process_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "paysnap_block_process_time_ms",
                "Block fetch and dispatch time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            blocks_processed,
            block_fetch_failures,
            payments_opened,
            proofs_attached,
            payouts_sent,
            payout_milli_hbd,
            rejections,
            broadcast_failures,
            pending_payments,
            cursor_height,
            endpoint_failovers,
            block_process_time_ms,
        })
    }

    pub fn record_rejection(&self, reason: &str) {
        self.rejections.with_label_values(&[reason]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    #[test]
    fn registry_exports_paysnap_metrics() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.blocks_processed.inc();
        metrics.record_rejection("timed_out");
        metrics.pending_payments.set(2);

        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&metrics.registry.gather(), &mut buf)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("paysnap_blocks_processed_total 1"));
        assert!(text.contains("paysnap_rejections_total{reason=\"timed_out\"} 1"));
        assert!(text.contains("paysnap_pending_payments 2"));
    }
}
