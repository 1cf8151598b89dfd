//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call for dependency D:
//!     → registry.rs (get or create D's breaker)
//!     → circuit_breaker.rs (admit or fail fast, record outcome)
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream provider, never a global one
//! - Breakers gate admission only; in-flight calls are not limited
//! - The reset timeout is the only backoff

pub mod circuit_breaker;
pub mod registry;

pub use circuit_breaker::{
    BreakerError, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitOpen,
    CircuitState, Permit,
};
pub use registry::CircuitBreakerRegistry;
