//! LMDB implementation of ProcessedOpStore.
//!
//! Key format: `block.to_be_bytes() ++ trx_id.as_bytes()`. Value: empty.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use paysnap_store::{ProcessedOpStore, StoreError};

use crate::LmdbError;

#[derive(Clone)]
pub struct LmdbProcessedOpStore {
    pub(crate) env: Arc<Env>,
    pub(crate) processed_db: Database<Bytes, Bytes>,
}

fn processed_key(block: u64, trx_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + trx_id.len());
    key.extend_from_slice(&block.to_be_bytes());
    key.extend_from_slice(trx_id.as_bytes());
    key
}

impl ProcessedOpStore for LmdbProcessedOpStore {
    fn mark_processed(&self, block: u64, trx_id: &str) -> Result<(), StoreError> {
        let key = processed_key(block, trx_id);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.processed_db
            .put(&mut wtxn, &key, &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn is_processed(&self, block: u64, trx_id: &str) -> Result<bool, StoreError> {
        let key = processed_key(block, trx_id);
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let found = self
            .processed_db
            .get(&rtxn, &key)
            .map_err(LmdbError::from)?
            .is_some();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    #[test]
    fn marks_are_keyed_by_block_and_trx() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let store = &env.processed;

        store.mark_processed(42, "abc").unwrap();
        assert!(store.is_processed(42, "abc").unwrap());
        assert!(!store.is_processed(43, "abc").unwrap());
        assert!(!store.is_processed(42, "abd").unwrap());

        // Marking twice is harmless.
        store.mark_processed(42, "abc").unwrap();
        assert!(store.is_processed(42, "abc").unwrap());
    }
}
