//! Row limits for list endpoints.

use serde::Deserialize;

/// Rows returned when `limit` is not given.
pub const DEFAULT_LIMIT: usize = 10;

/// Largest `limit` a caller may ask for.
pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

impl LimitParams {
    /// Requested limit clamped to `[1, MAX_LIMIT]`.
    pub fn effective(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}
