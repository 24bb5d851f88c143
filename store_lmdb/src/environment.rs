//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tracing::info;

use paysnap_store::{
    CounterStore, EventFilter, PaymentEvent, PaymentEventStore, ProcessedOpStore, StoreError,
    StoredPaymentEvent, UserCounter,
};
use paysnap_types::AccountName;

use crate::{LmdbCounterStore, LmdbError, LmdbPaymentEventStore, LmdbProcessedOpStore};

/// Default map size: 256 MiB is years of audit rows at bot volumes.
pub const DEFAULT_MAP_SIZE: usize = 256 * 1024 * 1024;

const MAX_DBS: u32 = 8;

/// Wraps the LMDB environment and all database handles.
///
/// Cheap to clone; every clone shares the same environment. LMDB serialises
/// writers internally, so the ingestion worker and the admin surface can hold
/// clones concurrently.
#[derive(Clone)]
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub counters: LmdbCounterStore,
    pub events: LmdbPaymentEventStore,
    pub processed: LmdbProcessedOpStore,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment in the directory `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        let mut options = EnvOpenOptions::new();
        options.map_size(map_size).max_dbs(MAX_DBS);
        // SAFETY: the environment directory is owned by this process; nothing
        // else opens the same files with a different map size.
        let env = unsafe { options.open(path)? };
        let env = Arc::new(env);

        let mut wtxn = env.write_txn()?;
        let counters_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("counters"))?;
        let events_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("events"))?;
        let processed_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("processed_ops"))?;
        wtxn.commit()?;

        info!(path = %path.display(), "opened LMDB environment");

        Ok(Self {
            counters: LmdbCounterStore {
                env: Arc::clone(&env),
                counters_db,
            },
            events: LmdbPaymentEventStore {
                env: Arc::clone(&env),
                events_db,
            },
            processed: LmdbProcessedOpStore {
                env: Arc::clone(&env),
                processed_db,
            },
            env,
        })
    }

    /// Flush dirty pages to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}

impl CounterStore for LmdbEnvironment {
    fn get_counter(&self, username: &AccountName) -> Result<Option<UserCounter>, StoreError> {
        self.counters.get_counter(username)
    }

    fn put_counter(&self, counter: &UserCounter) -> Result<(), StoreError> {
        self.counters.put_counter(counter)
    }

    fn reset_counter(&self, username: &AccountName) -> Result<bool, StoreError> {
        self.counters.reset_counter(username)
    }

    fn recent_counters(&self, limit: usize) -> Result<Vec<UserCounter>, StoreError> {
        self.counters.recent_counters(limit)
    }
}

impl PaymentEventStore for LmdbEnvironment {
    fn append_event(&self, event: &PaymentEvent) -> Result<u64, StoreError> {
        self.events.append_event(event)
    }

    fn recent_events(
        &self,
        limit: usize,
        filter: EventFilter,
    ) -> Result<Vec<StoredPaymentEvent>, StoreError> {
        self.events.recent_events(limit, filter)
    }

    fn event_count(&self) -> Result<u64, StoreError> {
        self.events.event_count()
    }
}

impl ProcessedOpStore for LmdbEnvironment {
    fn mark_processed(&self, block: u64, trx_id: &str) -> Result<(), StoreError> {
        self.processed.mark_processed(block, trx_id)
    }

    fn is_processed(&self, block: u64, trx_id: &str) -> Result<bool, StoreError> {
        self.processed.is_processed(block, trx_id)
    }
}
