//! Stop signal shared by the ingestion worker, the admin server and the
//! metrics refresher.
//!
//! The worker only looks at the signal between blocks, so a block that is
//! being dispatched or a sweep that is paying out always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Why the node is stopping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopCause {
    Interrupt,
    Terminate,
    /// Stopped from code, e.g. [`PaysnapNode::stop`](crate::PaysnapNode::stop).
    Requested,
}

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Signal every subscriber. Only the first call has any effect.
    pub fn trigger(&self, cause: StopCause) {
        if self.triggered.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(?cause, "stopping");
        let _ = self.tx.send(());
    }

    pub fn shutdown(&self) {
        self.trigger(StopCause::Requested);
    }

    /// Block until SIGINT or SIGTERM arrives (or [`shutdown`](Self::shutdown)
    /// is called elsewhere), then trigger.
    pub async fn wait_for_signal(&self) {
        let mut requested = self.subscribe();
        if self.is_triggered() {
            return;
        }

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let cause = tokio::select! {
            _ = signal::ctrl_c() => StopCause::Interrupt,
            _ = terminate => StopCause::Terminate,
            _ = requested.recv() => StopCause::Requested,
        };
        self.trigger(cause);
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking check for the worker loop. A closed or lagged channel
/// counts as stopped.
pub fn shutdown_requested(rx: &mut broadcast::Receiver<()>) -> bool {
    !matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty))
}
