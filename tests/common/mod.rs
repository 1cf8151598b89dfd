//! Shared utilities for integration tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use inference_gate::budget::InMemorySpendStore;
use inference_gate::config::GateConfig;
use inference_gate::AdmissionGate;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("provider returned {0}")]
pub struct ProviderError(pub u16);

/// A fake upstream provider whose health can be flipped at runtime.
#[derive(Debug, Default)]
pub struct MockProvider {
    calls: AtomicU32,
    failing: AtomicBool,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.failing.load(Ordering::SeqCst) {
            Err(ProviderError(503))
        } else {
            Ok(format!("completion for {prompt}"))
        }
    }
}

/// Gate config with the knobs integration tests care about.
#[allow(dead_code)]
pub fn config(limit: f64, fail_max: u32, reset_timeout_ms: u64) -> GateConfig {
    let mut config = GateConfig::default();
    config.budget.default_limit = limit;
    config.breaker.defaults.fail_max = fail_max;
    config.breaker.defaults.reset_timeout_ms = reset_timeout_ms;
    config
}

/// Gate over a fresh in-memory store.
#[allow(dead_code)]
pub fn gate(config: &GateConfig) -> Arc<AdmissionGate> {
    let store = Arc::new(InMemorySpendStore::new());
    Arc::new(AdmissionGate::from_config(config, store))
}

#[allow(dead_code)]
pub async fn spend(gate: &AdmissionGate, tenant: &str) -> f64 {
    gate.ledger()
        .snapshot(tenant)
        .await
        .expect("in-memory store is always available")
        .spend
}
