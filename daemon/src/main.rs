//! Pay n Snap daemon: runs the cashback engine and a few operator commands.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use paysnap_node::{init_logging, LogFormat, NodeConfig, PaysnapNode};
use paysnap_store::{CounterStore, EventFilter, PaymentEventStore};
use paysnap_store_lmdb::environment::DEFAULT_MAP_SIZE;
use paysnap_store_lmdb::LmdbEnvironment;
use paysnap_types::AccountName;

#[derive(Parser, Debug)]
#[command(name = "paysnap-daemon", about = "Pay n Snap cashback engine", version)]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "PAYSNAP_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Data directory for LMDB storage.
    #[arg(long, env = "PAYSNAP_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Cursor file; relative paths resolve against the data directory.
    #[arg(long, env = "PAYSNAP_CURSOR_FILE", global = true)]
    cursor_file: Option<PathBuf>,

    /// Admin HTTP port.
    #[arg(long, env = "PAYSNAP_ADMIN_PORT", global = true)]
    admin_port: Option<u16>,

    /// Token required by mutating admin endpoints.
    #[arg(long, env = "PAYSNAP_ADMIN_TOKEN", global = true, hide_env_values = true)]
    admin_token: Option<String>,

    /// Discord-compatible webhook for operator notifications.
    #[arg(long, env = "PAYSNAP_WEBHOOK_URL", global = true, hide_env_values = true)]
    webhook_url: Option<String>,

    /// Log payouts and replies instead of broadcasting them.
    #[arg(long, env = "PAYSNAP_DRY_RUN", global = true)]
    dry_run: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "PAYSNAP_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "PAYSNAP_LOG_FORMAT", global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the engine until SIGINT or SIGTERM.
    Run,
    /// Print the most recent audit rows.
    Events {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Include rejected payments, not only payouts.
        #[arg(long)]
        all: bool,
    },
    /// Set a user's purchase counter back to zero.
    ResetCounter { username: String },
    /// Print the effective configuration as TOML.
    PrintConfig,
}

/// File config (or defaults) with CLI flags and env vars layered on top.
fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let base = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NodeConfig::default(),
    };

    let config = NodeConfig {
        data_dir: cli.data_dir.clone().unwrap_or(base.data_dir),
        cursor_file: cli.cursor_file.clone().unwrap_or(base.cursor_file),
        admin_port: cli.admin_port.unwrap_or(base.admin_port),
        admin_token: cli.admin_token.clone().or(base.admin_token),
        webhook_url: cli.webhook_url.clone().or(base.webhook_url),
        dry_run: cli.dry_run || base.dry_run,
        log_level: cli.log_level.clone().unwrap_or(base.log_level),
        log_format: cli.log_format.clone().unwrap_or(base.log_format),
        ..base
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    info!(
        data_dir = %config.data_dir.display(),
        dry_run = config.dry_run,
        "starting daemon"
    );
    let mut node = PaysnapNode::new(config).context("failed to initialise node")?;
    let started = node.start().await;
    node.stop().await?;
    if let Err(e) = &started {
        warn!(error = %e, "engine stopped with an error");
    }
    started.context("node exited with an error")
}

fn open_store(config: &NodeConfig) -> anyhow::Result<LmdbEnvironment> {
    LmdbEnvironment::open(&config.data_dir, DEFAULT_MAP_SIZE)
        .with_context(|| format!("opening store at {}", config.data_dir.display()))
}

fn list_events(config: &NodeConfig, limit: usize, all: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let filter = if all {
        EventFilter::All
    } else {
        EventFilter::PaidOnly
    };
    let rows = store.recent_events(limit, filter)?;
    if rows.is_empty() {
        println!("no events");
        return Ok(());
    }
    for row in rows {
        let e = &row.event;
        println!(
            "{:>6}  {}  {:<16} {:>10}  {:<8} {}",
            row.id,
            e.recorded_at,
            e.username,
            e.amount.to_string(),
            if e.paid { "paid" } else { "rejected" },
            e.reason
        );
    }
    Ok(())
}

fn reset_counter(config: &NodeConfig, username: &str) -> anyhow::Result<()> {
    let name = AccountName::parse(username)?;
    let store = open_store(config)?;
    if store.reset_counter(&name)? {
        store.sync()?;
        info!(username = %name, "purchase counter reset");
        println!("counter for {name} reset");
        Ok(())
    } else {
        anyhow::bail!("no counter for {name}")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let format = LogFormat::from_str(&config.log_format)?;
    init_logging(format, &config.log_level)?;

    match cli.command {
        Command::Run => run(config).await,
        Command::Events { limit, all } => list_events(&config, limit, all),
        Command::ResetCounter { username } => reset_counter(&config, &username),
        Command::PrintConfig => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("paysnap-daemon").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "run",
            "--data-dir",
            "/tmp/paysnap",
            "--admin-port",
            "9100",
            "--dry-run",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/paysnap"));
        assert_eq!(config.admin_port, 9100);
        assert!(config.dry_run);
        assert_eq!(config.pending_timeout_secs, 120);
    }

    #[test]
    fn file_values_survive_unset_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paysnap.toml");
        std::fs::write(&path, "stores = [\"kcs-store\"]\nadmin_port = 8200\n").unwrap();

        let cli = parse(&["--config", path.to_str().unwrap(), "print-config"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.admin_port, 8200);
        assert_eq!(config.stores.len(), 1);
    }

    #[test]
    fn events_subcommand_defaults_to_ten_paid_rows() {
        let cli = parse(&["events"]);
        assert!(matches!(
            cli.command,
            Command::Events {
                limit: 10,
                all: false
            }
        ));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = parse(&["--config", "/nonexistent/paysnap.toml", "run"]);
        assert!(load_config(&cli).is_err());
    }
}
