//! Admission control for inference calls.
//!
//! # Responsibilities
//! - Charge the tenant's budget before any upstream work starts
//! - Refuse calls to providers whose breaker is open
//! - Record upstream outcomes on the provider's breaker
//! - Refund the reservation when the call does not complete
//!
//! # Data Flow
//! ```text
//! admit(tenant, dependency, cost, op)
//!   -> BudgetLedger::reserve        (denied: BudgetExceeded / LedgerUnavailable)
//!   -> CircuitBreakerRegistry::get_or_create(dependency)
//!   -> CircuitBreaker::call(op)     (open: rollback, BreakerOpen)
//!   -> Ok: commit | Err: rollback, OperationFailed
//! ```
//!
//! # Design Decisions
//! - Budget is checked before the breaker, so a tenant over budget never
//!   contributes a trial call to a recovering provider
//! - The reservation is held by a [`ReservationGuard`]; a cancelled admission
//!   refunds in the background
//! - A denied reservation is left charged unless `budget.refund_denied` is set

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::budget::{BudgetLedger, LedgerError, Outcome, PricingTable, SpendStore};
use crate::config::GateConfig;
use crate::gate::error::GateError;
use crate::gate::guard::ReservationGuard;
use crate::observability::metrics;
use crate::resilience::{BreakerError, CircuitBreakerRegistry};
use crate::routing::ProviderResolver;

/// Composes the budget ledger with per-provider circuit breakers.
///
/// Cheap to share: clone the `Arc` you hold it in.
pub struct AdmissionGate {
    ledger: Arc<BudgetLedger>,
    breakers: Arc<CircuitBreakerRegistry>,
    resolver: ProviderResolver,
    pricing: PricingTable,
}

impl AdmissionGate {
    pub fn new(ledger: Arc<BudgetLedger>, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self {
            ledger,
            breakers,
            resolver: ProviderResolver::default(),
            pricing: PricingTable::default(),
        }
    }

    /// Build every component from configuration over the given store.
    pub fn from_config(config: &GateConfig, store: Arc<dyn SpendStore>) -> Self {
        Self {
            ledger: Arc::new(BudgetLedger::new(store, config.budget.clone())),
            breakers: Arc::new(CircuitBreakerRegistry::from_config(&config.breaker)),
            resolver: ProviderResolver::from_config(&config.routing),
            pricing: PricingTable::from_config(&config.pricing),
        }
    }

    pub fn with_resolver(mut self, resolver: ProviderResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn ledger(&self) -> &Arc<BudgetLedger> {
        &self.ledger
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn resolver(&self) -> &ProviderResolver {
        &self.resolver
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Run `operation` against `dependency` on behalf of `tenant`, charging
    /// `estimated_cost` up front.
    ///
    /// `operation` is invoked at most once, and only after the reservation
    /// succeeded and the breaker admitted the call. Its error is returned
    /// unchanged inside [`GateError::OperationFailed`].
    pub async fn admit<F, Fut, T, E>(
        &self,
        tenant: &str,
        dependency: &str,
        estimated_cost: f64,
        operation: F,
    ) -> Result<T, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let outcome = match self.ledger.reserve(tenant, estimated_cost).await {
            Ok(outcome) => outcome,
            Err(LedgerError::InvalidCost(cost)) => {
                metrics::record_admission("invalid_request");
                return Err(GateError::InvalidRequest(format!(
                    "estimated cost must be a finite, non-negative amount (got {cost})"
                )));
            }
            Err(LedgerError::Store(e)) => Outcome::LedgerUnavailable {
                reason: e.to_string(),
            },
        };

        let period = match outcome {
            Outcome::Allowed { new_total, period } => {
                debug!(
                    tenant,
                    dependency,
                    estimated_cost,
                    new_total,
                    "Budget reserved"
                );
                period
            }
            Outcome::BudgetExceeded {
                new_total,
                limit,
                period,
            } => {
                info!(
                    tenant,
                    dependency,
                    new_total,
                    limit,
                    "Budget exceeded, call refused"
                );
                if self.ledger.config().refund_denied {
                    let ledger = Arc::clone(&self.ledger);
                    ReservationGuard::new(ledger, tenant, estimated_cost, period)
                        .rollback("budget_exceeded")
                        .await;
                }
                metrics::record_admission("budget_exceeded");
                return Err(GateError::BudgetExceeded {
                    tenant: tenant.to_string(),
                    spend: new_total,
                    limit,
                });
            }
            Outcome::LedgerUnavailable { reason } => {
                warn!(
                    tenant,
                    dependency,
                    reason = %reason,
                    "Budget ledger unavailable, call refused"
                );
                metrics::record_admission("ledger_unavailable");
                return Err(GateError::LedgerUnavailable { reason });
            }
        };

        let guard = ReservationGuard::new(Arc::clone(&self.ledger), tenant, estimated_cost, period);
        let breaker = self.breakers.get_or_create(dependency);

        match breaker.call(operation).await {
            Ok(value) => {
                guard.commit();
                metrics::record_admission("admitted");
                Ok(value)
            }
            Err(BreakerError::Open(open)) => {
                info!(
                    tenant,
                    dependency,
                    retry_after_ms = open.retry_after.as_millis() as u64,
                    "Circuit open, call refused"
                );
                guard.rollback("breaker_open").await;
                metrics::record_admission("breaker_open");
                Err(GateError::BreakerOpen(open))
            }
            Err(BreakerError::Inner(e)) => {
                warn!(
                    tenant,
                    dependency,
                    "Upstream call failed, reservation rolled back"
                );
                guard.rollback("operation_failed").await;
                metrics::record_admission("operation_failed");
                Err(GateError::OperationFailed(e))
            }
        }
    }

    /// Like [`admit`](Self::admit), resolving the provider and the estimated
    /// cost from a model name and token counts.
    pub async fn admit_model<F, Fut, T, E>(
        &self,
        tenant: &str,
        model: &str,
        input_tokens: u64,
        max_output_tokens: u64,
        operation: F,
    ) -> Result<T, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let dependency = self.resolver.resolve(model).to_string();
        let estimated_cost = self.pricing.estimate(model, input_tokens, max_output_tokens);
        self.admit(tenant, &dependency, estimated_cost, operation)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::ledger::tests::DownStore;
    use crate::budget::InMemorySpendStore;
    use crate::resilience::{CircuitBreakerConfig, CircuitState};
    use std::future::pending;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn gate(limit: f64, fail_max: u32) -> AdmissionGate {
        let mut config = GateConfig::default();
        config.budget.default_limit = limit;
        config.breaker.defaults.fail_max = fail_max;
        AdmissionGate::from_config(&config, Arc::new(InMemorySpendStore::new()))
    }

    async fn spend(gate: &AdmissionGate, tenant: &str) -> f64 {
        gate.ledger().snapshot(tenant).await.unwrap().spend
    }

    async fn succeed() -> Result<&'static str, String> {
        Ok("done")
    }

    async fn fail() -> Result<(), &'static str> {
        Err("503 from upstream")
    }

    #[tokio::test]
    async fn test_success_commits_reservation() {
        let gate = gate(50.0, 5);
        let out = gate.admit("acme", "openai", 10.0, succeed).await.unwrap();

        assert_eq!(out, "done");
        assert_eq!(spend(&gate, "acme").await, 10.0);
        assert_eq!(gate.breakers().get_or_create("openai").failure_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_counts() {
        let gate = gate(50.0, 5);
        let err = gate.admit("acme", "openai", 10.0, fail).await.unwrap_err();

        assert_eq!(err.into_operation_error(), Some("503 from upstream"));
        assert_eq!(spend(&gate, "acme").await, 0.0);
        assert_eq!(gate.breakers().get_or_create("openai").failure_count(), 1);
    }

    #[tokio::test]
    async fn test_budget_exceeded_skips_operation() {
        let gate = gate(15.0, 5);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        gate.admit("acme", "openai", 10.0, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        })
        .await
        .unwrap();

        let err = gate
            .admit("acme", "openai", 10.0, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await
            .unwrap_err();

        match err {
            GateError::BudgetExceeded {
                tenant,
                spend,
                limit,
            } => {
                assert_eq!(tenant, "acme");
                assert_eq!(spend, 20.0);
                assert_eq!(limit, 15.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        // The denied charge stays recorded
        assert_eq!(spend(&gate, "acme").await, 20.0);
    }

    #[tokio::test]
    async fn test_refund_denied_restores_total() {
        let mut config = GateConfig::default();
        config.budget.default_limit = 15.0;
        config.budget.refund_denied = true;
        let gate = AdmissionGate::from_config(&config, Arc::new(InMemorySpendStore::new()));

        gate.admit("acme", "openai", 10.0, succeed).await.unwrap();
        let err = gate
            .admit("acme", "openai", 10.0, succeed)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "budget_exceeded");
        assert_eq!(spend(&gate, "acme").await, 10.0);
    }

    #[tokio::test]
    async fn test_open_breaker_rolls_back_without_calling() {
        let gate = gate(50.0, 1);
        let _ = gate.admit("acme", "openai", 1.0, fail).await;
        let breaker = gate.breakers().get_or_create("openai");
        assert_eq!(breaker.state(), CircuitState::Open);

        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let err = gate
            .admit("acme", "openai", 5.0, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await
            .unwrap_err();

        match err {
            GateError::BreakerOpen(open) => assert_eq!(open.dependency, "openai"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(spend(&gate, "acme").await, 0.0);
    }

    #[tokio::test]
    async fn test_ledger_unavailable_fails_closed() {
        let gate = AdmissionGate::new(
            Arc::new(BudgetLedger::new(Arc::new(DownStore), Default::default())),
            Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default())),
        );
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let err = gate
            .admit("acme", "openai", 1.0, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::LedgerUnavailable { .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(gate.breakers().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_cost_is_rejected_before_charging() {
        let gate = gate(50.0, 5);
        let err = gate
            .admit("acme", "openai", -2.0, succeed)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(spend(&gate, "acme").await, 0.0);
    }

    #[tokio::test]
    async fn test_admit_model_resolves_provider() {
        let gate = gate(50.0, 1);
        let _ = gate
            .admit_model("acme", "claude-3-opus", 1_000, 500, fail)
            .await;

        let anthropic = gate.breakers().get_or_create("anthropic");
        let openai = gate.breakers().get_or_create("openai");
        assert_eq!(anthropic.state(), CircuitState::Open);
        assert_eq!(openai.state(), CircuitState::Closed);
        assert_eq!(spend(&gate, "acme").await, 0.0);
    }

    #[tokio::test]
    async fn test_cancelled_admission_refunds() {
        let gate = Arc::new(gate(50.0, 5));
        let task = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.admit("acme", "openai", 10.0, pending::<Result<(), String>>)
                    .await
            })
        };

        while spend(&gate, "acme").await == 0.0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        task.abort();
        let _ = task.await;

        for _ in 0..100 {
            if spend(&gate, "acme").await == 0.0 {
                // A cancelled call is neither a success nor a failure
                assert_eq!(gate.breakers().get_or_create("openai").failure_count(), 0);
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("cancelled admission left the reservation charged");
    }
}
