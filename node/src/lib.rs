//! Paysnap engine: turns invoice payments plus proof posts into cashback.
//!
//! The node is the central coordinator that:
//! - Follows the ledger block by block with endpoint failover
//! - Classifies invoice transfers and proof posts
//! - Correlates each payment with its proof post under a timeout
//! - Validates the operator's beneficiary share on the proof post
//! - Pays tiered cashback and replies under the post
//! - Records every outcome in an append-only audit log

pub mod cashback;
pub mod classifier;
pub mod config;
pub mod correlator;
pub mod cursor;
pub mod disbursement;
pub mod error;
pub mod ingestion;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod notifier;
pub mod pending;
pub mod shutdown;
pub mod snap_validator;
pub mod tracing_spans;

pub use cashback::CashbackPolicy;
pub use classifier::{Classified, EventClassifier, PaymentCandidate};
pub use config::NodeConfig;
pub use correlator::{Correlator, SweepReport};
pub use cursor::CursorFile;
pub use disbursement::{Disbursement, DisbursementOutcome};
pub use error::NodeError;
pub use ingestion::{IngestionPipeline, Pacing, StepOutcome};
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{NodeComponents, PaysnapNode};
pub use notifier::{Notification, Notifier, NoopNotifier, RecordingNotifier, Severity, WebhookNotifier};
pub use pending::{PendingPayment, PendingSet};
pub use shutdown::{ShutdownController, StopCause};
pub use snap_validator::SnapValidator;
