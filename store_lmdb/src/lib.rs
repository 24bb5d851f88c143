//! LMDB storage backend for the Paysnap cashback engine.
//!
//! Implements all storage traits from `paysnap-store` using the `heed` LMDB bindings.
//! Each logical store maps to one LMDB database within a single environment.

pub mod counter;
pub mod environment;
pub mod error;
pub mod payment_event;
pub mod processed;

pub use counter::LmdbCounterStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use payment_event::LmdbPaymentEventStore;
pub use processed::LmdbProcessedOpStore;
