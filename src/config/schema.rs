//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the inference admission gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Admin API settings.
    pub admin: AdminConfig,

    /// Per-tenant budget limits and accounting period.
    pub budget: BudgetConfig,

    /// Backing spend store.
    pub store: StoreConfig,

    /// Circuit breaker defaults and per-provider overrides.
    pub breaker: BreakerConfig,

    /// Model name to provider resolution.
    pub routing: RoutingConfig,

    /// Model pricing used for cost estimation.
    pub pricing: PricingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Budget accounting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Spend limit applied to tenants without an override (currency units).
    pub default_limit: f64,

    /// Length of the rolling accounting period in seconds.
    pub period_secs: u64,

    /// Store key prefix; keys are `{prefix}:{tenant}`.
    pub key_prefix: String,

    /// Per-tenant limit overrides.
    pub tenant_limits: HashMap<String, f64>,

    /// Roll back a reservation that was denied for exceeding the limit.
    /// Off by default: the optimistic charge stays recorded.
    pub refund_denied: bool,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_limit: 50.0,
            period_secs: 86_400,
            key_prefix: "budget".to_string(),
            tenant_limits: HashMap::new(),
            refund_denied: false,
        }
    }
}

impl BudgetConfig {
    /// Effective limit for a tenant.
    pub fn limit_for(&self, tenant: &str) -> f64 {
        self.tenant_limits
            .get(tenant)
            .copied()
            .unwrap_or(self.default_limit)
    }
}

/// Which spend store backs the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store. Single instance only.
    Memory,
    /// Shared Redis instance (requires the `redis_backend` feature).
    Redis,
}

/// Spend store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Redis connection string, e.g. `redis://127.0.0.1:6379`.
    pub redis_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: None,
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// In-window failures that trip the breaker.
    pub fail_max: u32,

    /// Time an open breaker waits before admitting a trial call, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Age after which a failure stops counting, in milliseconds.
    pub time_window_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            fail_max: 5,
            reset_timeout_ms: 60_000,
            time_window_ms: 60_000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Settings for providers without an override.
    #[serde(flatten)]
    pub defaults: BreakerSettings,

    /// Per-provider overrides.
    pub overrides: HashMap<String, BreakerSettings>,
}

/// Maps a model name prefix to a provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderRule {
    /// Model name prefix (case-insensitive), e.g. `gpt-4`.
    pub model_prefix: String,

    /// Provider (dependency key), e.g. `openai`.
    pub provider: String,
}

/// Provider resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Provider used when no rule matches.
    pub default_provider: String,

    pub rules: Vec<ProviderRule>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            rules: vec![
                ProviderRule {
                    model_prefix: "gpt-".to_string(),
                    provider: "openai".to_string(),
                },
                ProviderRule {
                    model_prefix: "claude-".to_string(),
                    provider: "anthropic".to_string(),
                },
                ProviderRule {
                    model_prefix: "gemini-".to_string(),
                    provider: "google".to_string(),
                },
            ],
        }
    }
}

/// Token pricing for a model family, per 1M tokens.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// Pricing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Model name prefix -> price.
    pub models: HashMap<String, ModelPrice>,

    /// Price for models with no matching entry.
    pub fallback: ModelPrice,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            models: HashMap::new(),
            fallback: ModelPrice {
                input_per_million: 10.0,
                output_per_million: 30.0,
            },
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GateConfig = toml::from_str("").unwrap();
        assert_eq!(config.budget.default_limit, 50.0);
        assert_eq!(config.budget.key_prefix, "budget");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.breaker.defaults.fail_max, 5);
    }

    #[test]
    fn test_breaker_overrides_parse() {
        let toml = r#"
            [breaker]
            fail_max = 3
            reset_timeout_ms = 100
            time_window_ms = 10000

            [breaker.overrides.anthropic]
            fail_max = 10
        "#;
        let config: GateConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.breaker.defaults.fail_max, 3);
        assert_eq!(config.breaker.defaults.reset_timeout_ms, 100);

        let anthropic = config.breaker.overrides["anthropic"];
        assert_eq!(anthropic.fail_max, 10);
        // Unset override fields fall back to the struct default, not the section default
        assert_eq!(anthropic.time_window_ms, 60_000);
    }

    #[test]
    fn test_tenant_limit_override() {
        let toml = r#"
            [budget]
            default_limit = 20.0

            [budget.tenant_limits]
            acme = 500.0
        "#;
        let config: GateConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.budget.limit_for("acme"), 500.0);
        assert_eq!(config.budget.limit_for("other"), 20.0);
    }
}
