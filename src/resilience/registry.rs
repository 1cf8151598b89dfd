//! One circuit breaker per upstream dependency.
//!
//! # Responsibilities
//! - Create a breaker lazily on first use of a dependency key
//! - Apply per-dependency overrides from config, defaults otherwise
//! - Expose snapshots and resets for the admin API
//!
//! # Design Decisions
//! - Backed by `DashMap`: get-or-create holds only the key's shard lock, so
//!   two callers racing on an unseen key get the same breaker and unrelated
//!   keys never wait on each other
//! - Breakers live for the process lifetime; nothing is evicted

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::BreakerConfig;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig};

/// Maps dependency keys to their breakers.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
}

impl CircuitBreakerRegistry {
    /// Create a registry where every breaker uses `defaults`.
    pub fn new(defaults: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
            overrides: HashMap::new(),
        }
    }

    /// Create a registry from configuration, including per-provider overrides.
    pub fn from_config(config: &BreakerConfig) -> Self {
        let overrides = config
            .overrides
            .iter()
            .map(|(key, settings)| {
                (key.clone(), CircuitBreakerConfig::from(settings))
            })
            .collect();

        Self {
            breakers: DashMap::new(),
            defaults: CircuitBreakerConfig::from(&config.defaults),
            overrides,
        }
    }

    /// Settings a new breaker for `dependency` would be created with.
    pub fn config_for(&self, dependency: &str) -> CircuitBreakerConfig {
        self.overrides
            .get(dependency)
            .copied()
            .unwrap_or(self.defaults)
    }

    /// Return the breaker for `dependency`, creating it on first use.
    pub fn get_or_create(&self, dependency: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(dependency) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                tracing::debug!(dependency, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(dependency, self.config_for(dependency)))
            });
        Arc::clone(entry.value())
    }

    /// The breaker for `dependency`, if one was created.
    pub fn get(&self, dependency: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(dependency).map(|r| Arc::clone(r.value()))
    }

    /// Snapshots of every breaker, sorted by dependency key.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|r| r.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.dependency.cmp(&b.dependency));
        snapshots
    }

    /// Reset one breaker. Returns false if it does not exist.
    pub fn reset(&self, dependency: &str) -> bool {
        match self.get(dependency) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset every breaker.
    pub fn reset_all(&self) {
        for breaker in self.breakers.iter() {
            breaker.value().reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
