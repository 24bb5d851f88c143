//! LMDB implementation of PaymentEventStore.
//!
//! Key: big-endian `u64` sequence id, so LMDB's key order is append order and
//! "most recent" is a reverse scan. Value: bincode-encoded [`PaymentEvent`].

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use paysnap_store::{EventFilter, PaymentEvent, PaymentEventStore, StoreError, StoredPaymentEvent};

use crate::LmdbError;

#[derive(Clone)]
pub struct LmdbPaymentEventStore {
    pub(crate) env: Arc<Env>,
    pub(crate) events_db: Database<Bytes, Bytes>,
}

fn decode_id(key: &[u8]) -> Result<u64, LmdbError> {
    let arr: [u8; 8] = key
        .try_into()
        .map_err(|_| LmdbError::MalformedKey {
            db: "events",
            detail: format!("expected 8 bytes, got {}", key.len()),
        })?;
    Ok(u64::from_be_bytes(arr))
}

impl PaymentEventStore for LmdbPaymentEventStore {
    fn append_event(&self, event: &PaymentEvent) -> Result<u64, StoreError> {
        let bytes = bincode::serialize(event).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let next_id = match self.events_db.last(&wtxn).map_err(LmdbError::from)? {
            Some((key, _)) => decode_id(key)? + 1,
            None => 1,
        };
        self.events_db
            .put(&mut wtxn, &next_id.to_be_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(next_id)
    }

    fn recent_events(
        &self,
        limit: usize,
        filter: EventFilter,
    ) -> Result<Vec<StoredPaymentEvent>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.events_db.rev_iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for entry in iter {
            if results.len() >= limit {
                break;
            }
            let (key, val) = entry.map_err(LmdbError::from)?;
            let event: PaymentEvent = bincode::deserialize(val).map_err(LmdbError::from)?;
            if filter.matches(&event) {
                results.push(StoredPaymentEvent {
                    id: decode_id(key)?,
                    event,
                });
            }
        }
        Ok(results)
    }

    fn event_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.events_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;
    use paysnap_types::{AccountName, HbdAmount, Timestamp};

    fn event(trx: &str, paid: bool) -> PaymentEvent {
        PaymentEvent {
            block: 100,
            trx_id: trx.to_string(),
            username: AccountName::new("alice"),
            amount: HbdAmount::from_milli(1500),
            memo: "kcs-hpos-2024-0007".to_string(),
            snap_permlink: None,
            paid,
            reason: if paid { "paid" } else { "timed out" }.to_string(),
            recorded_at: Timestamp::new(1_000),
        }
    }

    #[test]
    fn ids_increase_and_listing_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let store = &env.events;

        assert_eq!(store.append_event(&event("a", true)).unwrap(), 1);
        assert_eq!(store.append_event(&event("b", false)).unwrap(), 2);
        assert_eq!(store.append_event(&event("c", true)).unwrap(), 3);
        assert_eq!(store.event_count().unwrap(), 3);

        let all = store.recent_events(10, EventFilter::All).unwrap();
        let ids: Vec<u64> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let paid = store.recent_events(10, EventFilter::PaidOnly).unwrap();
        let trx: Vec<&str> = paid.iter().map(|e| e.event.trx_id.as_str()).collect();
        assert_eq!(trx, vec!["c", "a"]);
    }

    #[test]
    fn listing_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        for i in 0..5 {
            env.events.append_event(&event(&i.to_string(), true)).unwrap();
        }
        assert_eq!(env.events.recent_events(2, EventFilter::All).unwrap().len(), 2);
    }
}
