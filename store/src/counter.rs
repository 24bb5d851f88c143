//! Per-user purchase counter storage trait.

use crate::StoreError;
use paysnap_types::{AccountName, Timestamp};
use serde::{Deserialize, Serialize};

/// Cumulative count of successful cashback payouts for one account.
///
/// The count selects the tier of the *next* payout. It only grows, except
/// when an operator resets it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounter {
    pub username: AccountName,
    pub purchases: u32,
    pub last_purchase: Option<Timestamp>,
}

impl UserCounter {
    /// Ordinal of the purchase that would be paid next.
    pub fn next_purchase_num(&self) -> u32 {
        self.purchases.saturating_add(1)
    }
}

/// Trait for user counter storage operations.
pub trait CounterStore {
    /// Fetch the counter for `username`, or `None` if the account never got a payout.
    fn get_counter(&self, username: &AccountName) -> Result<Option<UserCounter>, StoreError>;

    /// Insert or replace the counter row.
    fn put_counter(&self, counter: &UserCounter) -> Result<(), StoreError>;

    /// Reset the purchase count to zero. Returns `false` if no row exists.
    fn reset_counter(&self, username: &AccountName) -> Result<bool, StoreError>;

    /// Counters ordered by most recent purchase first, at most `limit` rows.
    fn recent_counters(&self, limit: usize) -> Result<Vec<UserCounter>, StoreError>;

    /// Ordinal of the next purchase for `username` (1 for unknown accounts).
    fn next_purchase_num(&self, username: &AccountName) -> Result<u32, StoreError> {
        Ok(self
            .get_counter(username)?
            .map(|c| c.next_purchase_num())
            .unwrap_or(1))
    }
}
