//! The Paysnap node: wires the engine to its collaborators and runs it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use paysnap_chain::{Broadcaster, DryRunBroadcaster, FailoverRpc, LedgerRpc, RelayBroadcaster};
use paysnap_rpc::{AdminServer, AdminState};
use paysnap_store::CashbackStore;
use paysnap_store_lmdb::environment::DEFAULT_MAP_SIZE;
use paysnap_store_lmdb::LmdbEnvironment;
use paysnap_types::{Clock, SystemClock};

use crate::cashback::CashbackPolicy;
use crate::classifier::EventClassifier;
use crate::config::NodeConfig;
use crate::correlator::Correlator;
use crate::cursor::CursorFile;
use crate::disbursement::Disbursement;
use crate::error::NodeError;
use crate::ingestion::{IngestionPipeline, Pacing};
use crate::metrics::NodeMetrics;
use crate::notifier::{NoopNotifier, Notifier, WebhookNotifier};
use crate::shutdown::ShutdownController;
use crate::snap_validator::SnapValidator;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// How often the failover counter is copied into the metrics registry.
const METRICS_REFRESH: Duration = Duration::from_secs(5);

/// Everything the engine talks to outside its own memory.
#[derive(Clone)]
pub struct NodeComponents {
    pub store: Arc<dyn CashbackStore>,
    pub rpc: Arc<dyn LedgerRpc>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// A running Paysnap node.
pub struct PaysnapNode {
    pub config: NodeConfig,
    pub metrics: NodeMetrics,
    pub shutdown: Arc<ShutdownController>,
    components: NodeComponents,
    /// Set when the node opened its own LMDB environment.
    lmdb: Option<LmdbEnvironment>,
    /// Set when the node built its own endpoint failover.
    failover: Option<Arc<FailoverRpc>>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl PaysnapNode {
    /// Create a node from configuration alone.
    ///
    /// Opens the LMDB environment at `config.data_dir`, builds one ledger
    /// client per configured endpoint, and picks the broadcaster and the
    /// notifier the configuration asks for.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;

        let lmdb = LmdbEnvironment::open(&config.data_dir, DEFAULT_MAP_SIZE)
            .map_err(|e| NodeError::Store(e.into()))?;

        let failover = Arc::new(FailoverRpc::from_endpoints(
            &config.rpc_endpoints,
            config.request_timeout(),
        )?);
        if failover.is_empty() {
            return Err(NodeError::Config("rpc_endpoints is empty".into()));
        }

        let broadcaster: Arc<dyn Broadcaster> = if config.dry_run {
            warn!("dry run: payouts and replies are logged, not broadcast");
            Arc::new(DryRunBroadcaster::new())
        } else if let Some(url) = &config.broadcast_relay_url {
            Arc::new(RelayBroadcaster::new(url.clone(), config.request_timeout())?)
        } else {
            return Err(NodeError::Config(
                "broadcast_relay_url is required unless dry_run is set".into(),
            ));
        };

        let notifier: Arc<dyn Notifier> = match &config.webhook_url {
            Some(url) => Arc::new(
                WebhookNotifier::new(url.clone(), config.webhook_username.clone())
                    .map_err(|e| NodeError::Config(format!("webhook client: {e}")))?,
            ),
            None => Arc::new(NoopNotifier),
        };

        let components = NodeComponents {
            store: Arc::new(lmdb.clone()),
            rpc: failover.clone(),
            broadcaster,
            notifier,
            clock: Arc::new(SystemClock),
        };

        let mut node = Self::with_components(config, components)?;
        node.lmdb = Some(lmdb);
        node.failover = Some(failover);
        Ok(node)
    }

    /// Create a node around caller-supplied collaborators.
    pub fn with_components(
        config: NodeConfig,
        components: NodeComponents,
    ) -> Result<Self, NodeError> {
        Ok(Self {
            config,
            metrics: NodeMetrics::new()?,
            shutdown: Arc::new(ShutdownController::new()),
            components,
            lmdb: None,
            failover: None,
            task_handles: Vec::new(),
        })
    }

    pub fn components(&self) -> &NodeComponents {
        &self.components
    }

    /// Assemble the ingestion pipeline, positioned at the durable cursor.
    pub async fn build_pipeline(&self) -> Result<IngestionPipeline, NodeError> {
        let c = &self.components;
        let config = &self.config;

        let validator = SnapValidator::from_config(c.rpc.clone(), config);
        let disbursement = Disbursement::new(
            c.broadcaster.clone(),
            c.store.clone(),
            c.clock.clone(),
            CashbackPolicy::from_config(config),
            config.bot_account.clone(),
        );
        let correlator = Correlator::new(
            c.store.clone(),
            validator,
            disbursement,
            c.notifier.clone(),
            c.clock.clone(),
            self.metrics.clone(),
            config.limits.daily_cashback_limit,
            config.pending_timeout_secs,
        );

        IngestionPipeline::start(
            c.rpc.clone(),
            EventClassifier::from_config(config),
            correlator,
            c.store.clone(),
            c.notifier.clone(),
            c.clock.clone(),
            self.metrics.clone(),
            CursorFile::new(config.cursor_path()),
        )
        .await
    }

    /// Spawn ingestion, the admin server and the metrics refresher.
    ///
    /// Fails when no starting block can be determined.
    pub async fn spawn(&mut self) -> Result<(), NodeError> {
        if self.config.stores.is_empty() {
            warn!("no store accounts configured, no payment will ever qualify");
        }

        let pipeline = self.build_pipeline().await?;
        let pacing = Pacing {
            poll_interval: self.config.poll_interval(),
            retry_backoff: self.config.retry_backoff(),
        };
        let shutdown_rx = self.shutdown.subscribe();
        let ingest_handle = tokio::spawn(pipeline.run(pacing, shutdown_rx));
        self.task_handles.push(ingest_handle);

        if let Some(failover) = self.failover.clone() {
            let gauge = self.metrics.endpoint_failovers.clone();
            let mut shutdown_rx = self.shutdown.subscribe();
            let refresh_handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval(METRICS_REFRESH);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = interval.tick() => {
                            gauge.set(failover.failover_count() as i64);
                        }
                    }
                }
            });
            self.task_handles.push(refresh_handle);
        }

        if self.config.admin_enabled {
            let state = Arc::new(AdminState {
                store: self.components.store.clone(),
                admin_token: self.config.admin_token.clone(),
                registry: Some(self.metrics.registry.clone()),
            });
            let server = AdminServer::new(self.config.admin_port, state);
            let mut shutdown_rx = self.shutdown.subscribe();
            let admin_handle = tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        info!("admin server shutting down");
                    }
                    result = server.start() => {
                        match result {
                            Ok(()) => info!("admin server exited"),
                            Err(e) => error!(error = %e, "admin server error"),
                        }
                    }
                }
            });
            self.task_handles.push(admin_handle);
        }

        info!(
            bot = %self.config.bot_account,
            stores = self.config.stores.len(),
            endpoints = self.config.rpc_endpoints.len(),
            dry_run = self.config.dry_run,
            "paysnap node started"
        );
        Ok(())
    }

    /// Spawn every task, then block until SIGINT or SIGTERM.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        self.spawn().await?;
        self.shutdown.wait_for_signal().await;
        Ok(())
    }

    /// Stop the node gracefully.
    ///
    /// 1. Sends the shutdown signal to all background tasks.
    /// 2. Waits for them to finish (with timeout).
    /// 3. Flushes LMDB.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        info!("paysnap node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        let timed_out = tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all)
            .await
            .is_err();
        if timed_out {
            warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        if let Some(lmdb) = &self.lmdb {
            match lmdb.sync() {
                Ok(()) => info!("LMDB flushed to disk"),
                Err(e) => warn!(error = %e, "LMDB sync failed"),
            }
        }

        info!("paysnap node stopped");
        if timed_out {
            return Err(NodeError::ShutdownTimeout);
        }
        Ok(())
    }
}
