//! RAII guard for a budget reservation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::budget::{BudgetLedger, PeriodId};
use crate::observability::metrics;

/// Holds a reservation until the protected call settles.
///
/// [`commit`](Self::commit) keeps the charge; [`rollback`](Self::rollback)
/// refunds it. A guard dropped while still armed (the admitting future was
/// cancelled mid-call) spawns a best-effort refund on the current Tokio
/// runtime. Refunds only apply to the period the charge was made in.
pub struct ReservationGuard {
    ledger: Arc<BudgetLedger>,
    tenant: String,
    cost: f64,
    period: PeriodId,
    armed: bool,
}

impl ReservationGuard {
    pub fn new(
        ledger: Arc<BudgetLedger>,
        tenant: impl Into<String>,
        cost: f64,
        period: PeriodId,
    ) -> Self {
        Self {
            ledger,
            tenant: tenant.into(),
            cost,
            period,
            armed: true,
        }
    }

    /// Keep the charge.
    pub fn commit(mut self) {
        self.armed = false;
    }

    /// Refund the charge and wait for the store to answer.
    ///
    /// The refund runs on its own task, so it completes exactly once even
    /// if the caller stops waiting.
    pub async fn rollback(mut self, reason: &'static str) {
        self.armed = false;
        let task = tokio::spawn(refund(
            Arc::clone(&self.ledger),
            self.tenant.clone(),
            self.cost,
            self.period,
            reason,
        ));
        if let Err(e) = task.await {
            warn!(tenant = %self.tenant, reason, error = %e, "Rollback task did not complete");
        }
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let ledger = Arc::clone(&self.ledger);
        let tenant = std::mem::take(&mut self.tenant);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(refund(ledger, tenant, self.cost, self.period, "cancelled"));
            }
            Err(_) => {
                warn!(
                    tenant = %tenant,
                    cost = self.cost,
                    "No runtime to roll back cancelled reservation"
                );
            }
        }
    }
}

async fn refund(
    ledger: Arc<BudgetLedger>,
    tenant: String,
    cost: f64,
    period: PeriodId,
    reason: &'static str,
) {
    match ledger.refund(&tenant, cost, period).await {
        Ok(new_total) => {
            metrics::record_rollback(reason);
            debug!(tenant = %tenant, cost, new_total, reason, "Reservation rolled back");
        }
        Err(e) => {
            warn!(tenant = %tenant, cost, reason, error = %e, "Failed to roll back reservation");
        }
    }
}
