//! Dependency key resolution.
//!
//! # Data Flow
//! ```text
//! Request target (model name)
//!     → resolver.rs (prefix rules from config)
//!     → dependency key (provider), used to pick the circuit breaker
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - Pure function of the model name: same input, same provider

pub mod resolver;

pub use resolver::ProviderResolver;
