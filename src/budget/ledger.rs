//! Per-tenant rolling budget ledger.
//!
//! Every mutation of a tenant's spend goes through one atomic store
//! operation: [`BudgetLedger::reserve`] increments and compares in a single
//! step, [`BudgetLedger::rollback`] decrements. Nothing here reads a total
//! and then writes it back.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::budget::store::{from_micros, to_micros, PeriodId, SpendStore, StoreError};
use crate::config::BudgetConfig;

/// Result of a reservation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The charge fits within the tenant's limit and is recorded in `period`.
    Allowed { new_total: f64, period: PeriodId },
    /// The charge pushed spend past the limit. It stays recorded.
    BudgetExceeded {
        new_total: f64,
        limit: f64,
        period: PeriodId,
    },
    /// The store could not be reached; admission must be denied.
    LedgerUnavailable { reason: String },
}

impl Outcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allowed { .. })
    }

    /// Total after the reservation, when the store answered.
    pub fn new_total(&self) -> Option<f64> {
        match self {
            Outcome::Allowed { new_total, .. } | Outcome::BudgetExceeded { new_total, .. } => {
                Some(*new_total)
            }
            Outcome::LedgerUnavailable { .. } => None,
        }
    }

    /// Period the charge was recorded in, when the store answered.
    pub fn period(&self) -> Option<PeriodId> {
        match self {
            Outcome::Allowed { period, .. } => Some(*period),
            Outcome::BudgetExceeded { period, .. } => Some(*period),
            Outcome::LedgerUnavailable { .. } => None,
        }
    }
}

/// Errors from ledger operations.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Negative, NaN or infinite cost. Rejected before touching the store.
    #[error("cost must be a finite, non-negative amount (got {0})")]
    InvalidCost(f64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Advisory budget state for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Ok,
    /// Spend is at or over the limit.
    Exhausted,
}

/// Point-in-time view of a tenant's spend.
#[derive(Debug, Clone, Serialize)]
pub struct SpendSnapshot {
    pub tenant: String,
    pub spend: f64,
    pub limit: f64,
    pub remaining: f64,
    pub utilization_pct: f64,
    pub status: BudgetStatus,
}

/// Rolling spend accounting for all tenants.
pub struct BudgetLedger {
    store: Arc<dyn SpendStore>,
    config: ArcSwap<BudgetConfig>,
}

impl BudgetLedger {
    /// Create a ledger over `store` with the given limits.
    pub fn new(store: Arc<dyn SpendStore>, config: BudgetConfig) -> Self {
        Self {
            store,
            config: ArcSwap::from_pointee(config),
        }
    }

    /// Replace limits and period settings. In-flight reservations are unaffected.
    pub fn update_config(&self, config: BudgetConfig) {
        tracing::info!(
            default_limit = config.default_limit,
            overrides = config.tenant_limits.len(),
            "Budget limits updated"
        );
        self.config.store(Arc::new(config));
    }

    /// Current budget configuration.
    pub fn config(&self) -> Arc<BudgetConfig> {
        self.config.load_full()
    }

    /// Effective limit for a tenant.
    pub fn limit_for(&self, tenant: &str) -> f64 {
        self.config.load().limit_for(tenant)
    }

    /// Store key for a tenant, e.g. `budget:acme`.
    pub fn key_for(&self, tenant: &str) -> String {
        format!("{}:{}", self.config.load().key_prefix, tenant)
    }

    /// Atomically charge `cost` to `tenant` and compare the resulting total
    /// against the tenant's limit.
    ///
    /// A charge that lands exactly on the limit is allowed. A charge that
    /// exceeds it is still recorded; see [`Outcome::BudgetExceeded`]. Store
    /// failures fail closed as [`Outcome::LedgerUnavailable`].
    pub async fn reserve(&self, tenant: &str, cost: f64) -> Result<Outcome, LedgerError> {
        validate_cost(cost)?;

        let config = self.config.load_full();
        let key = format!("{}:{}", config.key_prefix, tenant);
        let limit = config.limit_for(tenant);
        let period = Duration::from_secs(config.period_secs);

        match self
            .store
            .reserve(&key, to_micros(cost), to_micros(limit), period)
            .await
        {
            Ok(result) => {
                let new_total = from_micros(result.total);
                let period = result.period;
                debug!(
                    tenant,
                    cost,
                    new_total,
                    limit,
                    allowed = result.allowed,
                    "Budget reserved"
                );
                if result.allowed {
                    Ok(Outcome::Allowed { new_total, period })
                } else {
                    Ok(Outcome::BudgetExceeded {
                        new_total,
                        limit,
                        period,
                    })
                }
            }
            Err(e) => {
                warn!(tenant, error = %e, "Budget store unavailable, denying reservation");
                Ok(Outcome::LedgerUnavailable {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Atomically refund `cost` to `tenant`'s current period. Returns the
    /// new total.
    pub async fn rollback(&self, tenant: &str, cost: f64) -> Result<f64, LedgerError> {
        self.release(tenant, cost, None).await
    }

    /// Refund `cost` only if `period` is still the tenant's live period.
    ///
    /// A charge made in a period that has since ended is left alone, so a
    /// late refund never eats into the next period's spend. Returns the
    /// tenant's total afterwards.
    pub async fn refund(
        &self,
        tenant: &str,
        cost: f64,
        period: PeriodId,
    ) -> Result<f64, LedgerError> {
        self.release(tenant, cost, Some(period)).await
    }

    async fn release(
        &self,
        tenant: &str,
        cost: f64,
        period: Option<PeriodId>,
    ) -> Result<f64, LedgerError> {
        validate_cost(cost)?;

        let key = self.key_for(tenant);
        let total = self.store.release(&key, to_micros(cost), period).await?;
        let new_total = from_micros(total);
        debug!(tenant, cost, new_total, ?period, "Budget rolled back");
        Ok(new_total)
    }

    /// Whether the tenant is already at or over its limit.
    ///
    /// Advisory only; never used for gating. Fails open when the store is
    /// unreachable.
    pub async fn status(&self, tenant: &str) -> BudgetStatus {
        let key = self.key_for(tenant);
        match self.store.current(&key).await {
            Ok(total) => status_of(total, to_micros(self.limit_for(tenant))),
            Err(e) => {
                warn!(tenant, error = %e, "Budget status unavailable, reporting ok");
                BudgetStatus::Ok
            }
        }
    }

    /// Spend, limit and utilisation for a tenant.
    pub async fn snapshot(&self, tenant: &str) -> Result<SpendSnapshot, LedgerError> {
        let key = self.key_for(tenant);
        let total = self.store.current(&key).await?;
        let limit = self.limit_for(tenant);
        let spend = from_micros(total);
        let utilization_pct = if limit > 0.0 {
            (spend / limit) * 100.0
        } else {
            0.0
        };

        Ok(SpendSnapshot {
            tenant: tenant.to_string(),
            spend,
            limit,
            remaining: (limit - spend).max(0.0),
            utilization_pct,
            status: status_of(total, to_micros(limit)),
        })
    }

    /// Check that the backing store is reachable.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.store.health_check().await
    }
}

fn validate_cost(cost: f64) -> Result<(), LedgerError> {
    if cost.is_finite() && cost >= 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidCost(cost))
    }
}

fn status_of(total: i64, limit: i64) -> BudgetStatus {
    if total >= limit {
        BudgetStatus::Exhausted
    } else {
        BudgetStatus::Ok
    }
}
