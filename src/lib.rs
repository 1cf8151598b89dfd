//! Inference admission gate.
//!
//! Decides, before an upstream LLM call is made, whether the call may go
//! ahead: the tenant must have budget left in its rolling period and the
//! provider's circuit breaker must not be open.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──admit(tenant, dependency, cost, op)──▶ gate::AdmissionGate
//!                                                      │
//!                     ┌────────────────────────────────┼─────────────────────┐
//!                     ▼                                ▼                     ▼
//!             budget::BudgetLedger        resilience::CircuitBreakerRegistry  routing / pricing
//!                     │                                │
//!                     ▼                                ▼
//!             budget::SpendStore              resilience::CircuitBreaker ──▶ op()
//!          (memory | redis, atomic)             (one per provider)
//!
//!   Cross-cutting: config (TOML + hot reload), observability (tracing,
//!   Prometheus), http/admin (status API), lifecycle (signals, shutdown)
//! ```

// Core subsystems
pub mod budget;
pub mod gate;
pub mod resilience;
pub mod routing;

// Surfaces
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use budget::{BudgetLedger, BudgetStatus, InMemorySpendStore, Outcome, SpendStore};
pub use config::GateConfig;
pub use gate::{AdmissionGate, GateError};
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
