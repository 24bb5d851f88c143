//! Operator notifications.
//!
//! Notifications are fire-and-forget: [`Notifier::notify`] returns nothing
//! and a delivery failure is only ever logged.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use paysnap_types::{HbdAmount, ProofRef};

use crate::pending::PendingPayment;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Failure,
    Muted,
}

impl Severity {
    /// Embed colour as a 24-bit RGB integer.
    pub fn color(&self) -> u32 {
        match self {
            Severity::Info => 0x0099ff,
            Severity::Success => 0x00ff00,
            Severity::Warning => 0xffaa00,
            Severity::Failure => 0xff0000,
            Severity::Muted => 0x808080,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub fields: Vec<Field>,
}

impl Notification {
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn payment_opened(payment: &PendingPayment) -> Self {
        Self::new(
            "💳 New Payment Received",
            format!("Received payment from **@{}** - waiting for snap", payment.sender),
            Severity::Info,
        )
        .field("User", format!("@{}", payment.sender), true)
        .field("Amount", payment.amount.to_string(), true)
        .field("Store", payment.store.to_string(), true)
        .field("Invoice", payment.memo.clone(), true)
        .field("Block", payment.block.to_string(), true)
        .field("Status", "⏳ Waiting for snap", true)
    }

    pub fn daily_limit(payment: &PendingPayment, purchase_num: u32, limit: u32) -> Self {
        Self::new(
            "⚠️ Payment Rejected - Daily Limit",
            format!("**@{}** exceeded daily cashback limit", payment.sender),
            Severity::Warning,
        )
        .field("User", format!("@{}", payment.sender), true)
        .field("Purchase #", purchase_num.to_string(), true)
        .field("Daily Limit", limit.to_string(), true)
        .field("Amount", payment.amount.to_string(), true)
        .field("Invoice", payment.memo.clone(), true)
    }

    pub fn invalid_snap(payment: &PendingPayment, proof: &ProofRef) -> Self {
        Self::new(
            "❌ Payment Rejected - Invalid Snap",
            format!("**@{}** posted a snap with wrong beneficiaries", payment.sender),
            Severity::Failure,
        )
        .field("User", format!("@{}", payment.sender), true)
        .field("Amount", payment.amount.to_string(), true)
        .field("Invoice", payment.memo.clone(), true)
        .field("Snap Link", snap_link(proof), false)
        .field("Issue", "Beneficiaries not set correctly", false)
    }

    pub fn cashback_sent(
        payment: &PendingPayment,
        proof: &ProofRef,
        cashback: HbdAmount,
        purchase_num: u32,
    ) -> Self {
        Self::new(
            "💰 Cashback Sent!",
            format!("Successfully sent cashback to **@{}**", payment.sender),
            Severity::Success,
        )
        .field("User", format!("@{}", payment.sender), true)
        .field("Amount", cashback.to_string(), true)
        .field("Purchase #", purchase_num.to_string(), true)
        .field("Original Payment", payment.amount.to_string(), true)
        .field("Invoice", payment.memo.clone(), true)
        .field("Snap Link", snap_link(proof), false)
    }

    pub fn timed_out(payment: &PendingPayment, timeout_secs: u64) -> Self {
        Self::new(
            "⏰ Payment Timeout",
            format!("**@{}** payment timed out waiting for snap", payment.sender),
            Severity::Muted,
        )
        .field("User", format!("@{}", payment.sender), true)
        .field("Amount", payment.amount.to_string(), true)
        .field("Invoice", payment.memo.clone(), true)
        .field("Timeout", format!("{timeout_secs} seconds"), true)
    }

    /// Discord-compatible webhook payload.
    pub fn to_webhook_payload(&self, username: &str) -> serde_json::Value {
        let timestamp = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        let mut embed = json!({
            "title": self.title,
            "description": self.description,
            "color": self.severity.color(),
            "timestamp": timestamp,
        });
        if !self.fields.is_empty() {
            embed["fields"] = json!(self.fields);
        }
        json!({ "username": username, "embeds": [embed] })
    }
}

fn snap_link(proof: &ProofRef) -> String {
    format!("[@{}/{}]({})", proof.author, proof.permlink, proof.url())
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Used when no webhook is configured.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, notification: Notification) {
        debug!(title = %notification.title, "notifications disabled, skipping");
    }
}

/// Posts notifications to a Discord-compatible webhook on a background task.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
    username: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, username: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.into(),
            username: username.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, notification: Notification) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(title = %notification.title, "no async runtime, notification dropped");
            return;
        };
        let payload = notification.to_webhook_payload(&self.username);
        let request = self.http.post(&self.url).json(&payload);
        let title = notification.title;
        runtime.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(title = %title, "notification delivered");
                }
                Ok(resp) => {
                    warn!(title = %title, status = %resp.status(), "webhook rejected notification");
                }
                Err(e) => warn!(title = %title, error = %e, "webhook unreachable"),
            }
        });
    }
}

/// Keeps every notification in memory, for tests and dry runs.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.title).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification);
        }
    }
}
