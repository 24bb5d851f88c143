//! LMDB implementation of CounterStore.
//!
//! Key: account name bytes. Value: bincode-encoded [`UserCounter`].

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use paysnap_store::{CounterStore, StoreError, UserCounter};
use paysnap_types::AccountName;

use crate::LmdbError;

#[derive(Clone)]
pub struct LmdbCounterStore {
    pub(crate) env: Arc<Env>,
    pub(crate) counters_db: Database<Bytes, Bytes>,
}

impl CounterStore for LmdbCounterStore {
    fn get_counter(&self, username: &AccountName) -> Result<Option<UserCounter>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .counters_db
            .get(&rtxn, username.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => {
                let counter: UserCounter = bincode::deserialize(bytes).map_err(LmdbError::from)?;
                Ok(Some(counter))
            }
            None => Ok(None),
        }
    }

    fn put_counter(&self, counter: &UserCounter) -> Result<(), StoreError> {
        let bytes = bincode::serialize(counter).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.counters_db
            .put(&mut wtxn, counter.username.as_str().as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn reset_counter(&self, username: &AccountName) -> Result<bool, StoreError> {
        let key = username.as_str().as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let existing = match self.counters_db.get(&wtxn, key).map_err(LmdbError::from)? {
            Some(bytes) => {
                let counter: UserCounter = bincode::deserialize(bytes).map_err(LmdbError::from)?;
                counter
            }
            None => return Ok(false),
        };
        let reset = UserCounter {
            purchases: 0,
            ..existing
        };
        let bytes = bincode::serialize(&reset).map_err(LmdbError::from)?;
        self.counters_db
            .put(&mut wtxn, key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn recent_counters(&self, limit: usize) -> Result<Vec<UserCounter>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.counters_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut counters = Vec::new();
        for entry in iter {
            let (_key, val) = entry.map_err(LmdbError::from)?;
            let counter: UserCounter = bincode::deserialize(val).map_err(LmdbError::from)?;
            counters.push(counter);
        }
        counters.sort_by(|a, b| b.last_purchase.cmp(&a.last_purchase));
        counters.truncate(limit);
        Ok(counters)
    }
}
