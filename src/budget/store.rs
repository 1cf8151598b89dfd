//! Spend store abstraction.
//!
//! A [`SpendStore`] holds one running total per key, in integer micro-units,
//! and performs every mutation as a single atomic step on the store side.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Micro-units per currency unit.
pub const MICROS_PER_UNIT: f64 = 1_000_000.0;

/// Convert a currency amount to store micro-units.
pub fn to_micros(amount: f64) -> i64 {
    (amount * MICROS_PER_UNIT).round() as i64
}

/// Convert store micro-units back to a currency amount.
pub fn from_micros(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_UNIT
}

/// Errors raised by a spend store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached or the command failed.
    #[error("spend store unavailable: {0}")]
    Unavailable(String),

    /// The stored value could not be interpreted.
    #[error("spend store returned malformed data: {0}")]
    Malformed(String),
}

/// Identifies one accounting period of one key.
///
/// A new id is issued each time a key starts a fresh period, so a refund
/// tagged with an old id can tell that the period it was charged to is gone.
pub type PeriodId = u64;

/// Result of an atomic increment-and-compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveResult {
    /// Whether the resulting total is within the limit.
    pub allowed: bool,
    /// Total after the increment, in micro-units. The increment is kept even
    /// when `allowed` is false.
    pub total: i64,
    /// Period the increment landed in.
    pub period: PeriodId,
}

/// Shared key-value store for rolling spend totals.
#[async_trait]
pub trait SpendStore: Send + Sync {
    /// Atomically add `amount` to `key` and compare the new total against `limit`.
    ///
    /// If the key has no expiry yet, it is given `period` as its TTL.
    async fn reserve(
        &self,
        key: &str,
        amount: i64,
        limit: i64,
        period: Duration,
    ) -> Result<ReserveResult, StoreError>;

    /// Atomically subtract `amount` from `key`, flooring at zero.
    ///
    /// With `Some(period)` the key is only touched while that period is
    /// still the live one. A missing or expired key is never touched.
    /// Returns the key's total afterwards.
    async fn release(
        &self,
        key: &str,
        amount: i64,
        period: Option<PeriodId>,
    ) -> Result<i64, StoreError>;

    /// Current total for `key`, zero when absent.
    async fn current(&self, key: &str) -> Result<i64, StoreError>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}
