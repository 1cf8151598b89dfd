//! In-memory spend store.
//!
//! Uses [`DashMap`] with per-entry TTL expiry. Suitable for a single gate
//! instance and for tests; multi-instance deployments need a shared store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::budget::store::{PeriodId, ReserveResult, SpendStore, StoreError};

/// A running total with the instant its period ends.
#[derive(Debug)]
struct SpendEntry {
    total: i64,
    expires_at: Instant,
    period: PeriodId,
}

impl SpendEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local [`SpendStore`].
///
/// Each key's shard lock is held for the whole read-modify-write, so
/// concurrent reservations on one tenant are linearized. Expired entries are
/// reset lazily on access.
#[derive(Debug, Default)]
pub struct InMemorySpendStore {
    entries: DashMap<String, SpendEntry>,
    /// Source of period ids, unique across keys and resets.
    next_period: AtomicU64,
}

impl InMemorySpendStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn new_period(&self) -> PeriodId {
        self.next_period.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl SpendStore for InMemorySpendStore {
    async fn reserve(
        &self,
        key: &str,
        amount: i64,
        limit: i64,
        period: Duration,
    ) -> Result<ReserveResult, StoreError> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| SpendEntry {
                total: 0,
                expires_at: now + period,
                period: self.new_period(),
            });

        if !entry.is_live(now) {
            entry.total = 0;
            entry.expires_at = now + period;
            entry.period = self.new_period();
        }

        entry.total = entry.total.saturating_add(amount);
        Ok(ReserveResult {
            allowed: entry.total <= limit,
            total: entry.total,
            period: entry.period,
        })
    }

    async fn release(
        &self,
        key: &str,
        amount: i64,
        period: Option<PeriodId>,
    ) -> Result<i64, StoreError> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                if period.is_none() || period == Some(entry.period) {
                    entry.total = entry.total.saturating_sub(amount).max(0);
                }
                Ok(entry.total)
            }
            _ => Ok(0),
        }
    }

    async fn current(&self, key: &str) -> Result<i64, StoreError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Ok(entry.total);
            }
            // Expired: release the ref before removing
            drop(entry);
            self.entries.remove_if(key, |_, e| !e.is_live(now));
        }
        Ok(0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
