//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use paysnap_types::{AccountName, HbdAmount};

use crate::NodeError;

/// Configuration for a Paysnap node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Store accounts whose incoming invoice payments qualify for cashback.
    #[serde(default)]
    pub stores: Vec<AccountName>,

    #[serde(default)]
    pub rates: CashbackRates,

    #[serde(default)]
    pub caps: Caps,

    #[serde(default)]
    pub limits: Limits,

    /// Account that sends payouts and replies.
    #[serde(default = "default_bot_account")]
    pub bot_account: AccountName,

    /// Account that must be a beneficiary of every proof post.
    #[serde(default = "default_operator_account")]
    pub operator_account: AccountName,

    /// Parent author under which proof posts are published.
    #[serde(default = "default_proof_hub_account")]
    pub proof_hub_account: AccountName,

    /// Exact beneficiary weight required for the operator, in basis points.
    #[serde(default = "default_required_beneficiary_weight")]
    pub required_beneficiary_weight: u32,

    /// Seconds a payment waits for its proof before timing out.
    #[serde(default = "default_pending_timeout_secs")]
    pub pending_timeout_secs: u64,

    /// Ledger API nodes, tried in this order for every call.
    #[serde(default = "default_rpc_endpoints")]
    pub rpc_endpoints: Vec<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Wait between head checks once the cursor has caught up.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait before retrying a block that no endpoint could serve.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// File holding the last fully processed block height.
    #[serde(default = "default_cursor_file")]
    pub cursor_file: PathBuf,

    /// Data directory for LMDB storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Whether to serve the admin HTTP surface.
    #[serde(default = "default_true")]
    pub admin_enabled: bool,

    #[serde(default = "default_admin_port")]
    pub admin_port: u16,

    /// Shared secret for mutating admin actions. Never written back out.
    #[serde(default, skip_serializing)]
    pub admin_token: Option<String>,

    /// Discord-compatible webhook for operator notifications.
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_webhook_username")]
    pub webhook_username: String,

    /// Signing relay that broadcasts operations with the bot's keys.
    #[serde(default)]
    pub broadcast_relay_url: Option<String>,

    /// Log broadcasts instead of sending them.
    #[serde(default)]
    pub dry_run: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Cashback rate per purchase tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CashbackRates {
    #[serde(default = "default_rate_first")]
    pub first: f64,
    #[serde(default = "default_rate_second")]
    pub second: f64,
    #[serde(default = "default_rate_third")]
    pub third: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Caps {
    /// Largest invoice amount (HBD) that cashback is computed on.
    #[serde(default = "default_invoice_max")]
    pub invoice_max: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Highest purchase ordinal that can still be paid. Compared against the
    /// cumulative counter, which only an operator reset brings back down.
    #[serde(default = "default_daily_cashback_limit")]
    pub daily_cashback_limit: u32,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_bot_account() -> AccountName {
    AccountName::new("paynsnap")
}

fn default_operator_account() -> AccountName {
    AccountName::new("snapnpay")
}

fn default_proof_hub_account() -> AccountName {
    AccountName::new("peak.snaps")
}

fn default_required_beneficiary_weight() -> u32 {
    5000
}

fn default_pending_timeout_secs() -> u64 {
    120
}

fn default_rpc_endpoints() -> Vec<String> {
    [
        "https://api.hive.blog",
        "https://api.openhive.network",
        "https://anyx.io",
        "https://rpc.ausbit.dev",
        "https://rpc.mahdiyari.info",
        "https://api.hive.blue",
        "https://techcoderx.com",
        "https://hive.roelandp.nl",
        "https://hived.emre.sh",
        "https://api.deathwing.me",
        "https://api.c0ff33a.uk",
        "https://hive-api.arcange.eu",
        "https://hive-api.3speak.tv",
        "https://hiveapi.actifit.io",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_retry_backoff_ms() -> u64 {
    5_000
}

fn default_cursor_file() -> PathBuf {
    PathBuf::from("last_block.txt")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./paysnap_data")
}

fn default_true() -> bool {
    true
}

fn default_admin_port() -> u16 {
    8000
}

fn default_webhook_username() -> String {
    "PaySnap Bot".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rate_first() -> f64 {
    0.05
}

fn default_rate_second() -> f64 {
    0.07
}

fn default_rate_third() -> f64 {
    0.10
}

fn default_invoice_max() -> f64 {
    1.50
}

fn default_daily_cashback_limit() -> u32 {
    3
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        let rates = [self.rates.first, self.rates.second, self.rates.third];
        if rates.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(NodeError::Config(format!(
                "cashback rates must be non-negative, got {rates:?}"
            )));
        }
        if !self.caps.invoice_max.is_finite() || self.caps.invoice_max < 0.0 {
            return Err(NodeError::Config(format!(
                "caps.invoice_max must be non-negative, got {}",
                self.caps.invoice_max
            )));
        }
        if self.required_beneficiary_weight > 10_000 {
            return Err(NodeError::Config(format!(
                "required_beneficiary_weight is in basis points (max 10000), got {}",
                self.required_beneficiary_weight
            )));
        }
        if let Some(bad) = self.stores.iter().find(|s| !s.is_valid()) {
            return Err(NodeError::Config(format!("invalid store account: {bad}")));
        }
        Ok(())
    }

    pub fn invoice_cap(&self) -> HbdAmount {
        HbdAmount::from_hbd_f64(self.caps.invoice_max)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Cursor file location; relative paths resolve against the data directory.
    pub fn cursor_path(&self) -> PathBuf {
        if self.cursor_file.is_absolute() {
            self.cursor_file.clone()
        } else {
            self.data_dir.join(&self.cursor_file)
        }
    }
}

impl Default for CashbackRates {
    fn default() -> Self {
        Self {
            first: default_rate_first(),
            second: default_rate_second(),
            third: default_rate_third(),
        }
    }
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            invoice_max: default_invoice_max(),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            daily_cashback_limit: default_daily_cashback_limit(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            stores: Vec::new(),
            rates: CashbackRates::default(),
            caps: Caps::default(),
            limits: Limits::default(),
            bot_account: default_bot_account(),
            operator_account: default_operator_account(),
            proof_hub_account: default_proof_hub_account(),
            required_beneficiary_weight: default_required_beneficiary_weight(),
            pending_timeout_secs: default_pending_timeout_secs(),
            rpc_endpoints: default_rpc_endpoints(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            cursor_file: default_cursor_file(),
            data_dir: default_data_dir(),
            admin_enabled: default_true(),
            admin_port: default_admin_port(),
            admin_token: None,
            webhook_url: None,
            webhook_username: default_webhook_username(),
            broadcast_relay_url: None,
            dry_run: false,
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
