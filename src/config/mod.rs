//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → budget limits, breaker defaults, routing, pricing
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → BudgetLedger swaps in the new limits, admin API swaps its key
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only budget limits and the admin API key are hot-reloadable; breakers
//!   keep the settings they were created with

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BreakerConfig, BreakerSettings, BudgetConfig, GateConfig, ModelPrice,
    ObservabilityConfig, PricingConfig, ProviderRule, RoutingConfig, StoreBackend, StoreConfig,
};
pub use watcher::ConfigWatcher;
