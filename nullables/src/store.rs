//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use paysnap_store::{
    CounterStore, EventFilter, PaymentEvent, PaymentEventStore, ProcessedOpStore, StoreError,
    StoredPaymentEvent, UserCounter,
};
use paysnap_types::AccountName;

/// An in-memory implementation of every engine store.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullStore {
    counters: Mutex<HashMap<AccountName, UserCounter>>,
    events: Mutex<Vec<StoredPaymentEvent>>,
    processed: Mutex<HashSet<(u64, String)>>,
    fail_counter_reads: AtomicBool,
    fail_processed_lookups: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `get_counter` (and so `next_purchase_num`) fail.
    pub fn fail_counter_reads(&self, fail: bool) {
        self.fail_counter_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `is_processed` fail.
    pub fn fail_processed_lookups(&self, fail: bool) {
        self.fail_processed_lookups.store(fail, Ordering::SeqCst);
    }

    /// Seed a counter row directly.
    pub fn set_purchases(&self, username: &str, purchases: u32) {
        let username = AccountName::new(username);
        self.counters.lock().unwrap().insert(
            username.clone(),
            UserCounter {
                username,
                purchases,
                last_purchase: None,
            },
        );
    }

    /// Every event in append order.
    pub fn events(&self) -> Vec<PaymentEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event.clone())
            .collect()
    }
}

impl CounterStore for NullStore {
    fn get_counter(&self, username: &AccountName) -> Result<Option<UserCounter>, StoreError> {
        if self.fail_counter_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("counter read failed".into()));
        }
        Ok(self.counters.lock().unwrap().get(username).cloned())
    }

    fn put_counter(&self, counter: &UserCounter) -> Result<(), StoreError> {
        self.counters
            .lock()
            .unwrap()
            .insert(counter.username.clone(), counter.clone());
        Ok(())
    }

    fn reset_counter(&self, username: &AccountName) -> Result<bool, StoreError> {
        match self.counters.lock().unwrap().get_mut(username) {
            Some(counter) => {
                counter.purchases = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn recent_counters(&self, limit: usize) -> Result<Vec<UserCounter>, StoreError> {
        let mut rows: Vec<UserCounter> = self.counters.lock().unwrap().values().cloned().collect();
        rows.sort_by(|a, b| {
            b.last_purchase
                .cmp(&a.last_purchase)
                .then_with(|| a.username.cmp(&b.username))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

impl PaymentEventStore for NullStore {
    fn append_event(&self, event: &PaymentEvent) -> Result<u64, StoreError> {
        let mut events = self.events.lock().unwrap();
        let id = events.len() as u64 + 1;
        events.push(StoredPaymentEvent {
            id,
            event: event.clone(),
        });
        Ok(id)
    }

    fn recent_events(
        &self,
        limit: usize,
        filter: EventFilter,
    ) -> Result<Vec<StoredPaymentEvent>, StoreError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| filter.matches(&e.event))
            .take(limit)
            .cloned()
            .collect())
    }

    fn event_count(&self) -> Result<u64, StoreError> {
        Ok(self.events.lock().unwrap().len() as u64)
    }
}

impl ProcessedOpStore for NullStore {
    fn mark_processed(&self, block: u64, trx_id: &str) -> Result<(), StoreError> {
        self.processed
            .lock()
            .unwrap()
            .insert((block, trx_id.to_string()));
        Ok(())
    }

    fn is_processed(&self, block: u64, trx_id: &str) -> Result<bool, StoreError> {
        if self.fail_processed_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("processed lookup failed".into()));
        }
        Ok(self
            .processed
            .lock()
            .unwrap()
            .contains(&(block, trx_id.to_string())))
    }
}
