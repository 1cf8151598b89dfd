//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits finite and non-negative, thresholds >= 1)
//! - Check that the selected store backend is fully configured
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{BreakerSettings, GateConfig, StoreBackend};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("limit for {scope} must be finite and non-negative (got {value})")]
    InvalidLimit { scope: String, value: f64 },

    #[error("budget.period_secs must be greater than zero")]
    ZeroPeriod,

    #[error("budget.key_prefix must not be empty")]
    EmptyKeyPrefix,

    #[error("breaker fail_max for {scope} must be at least 1")]
    ZeroFailMax { scope: String },

    #[error("store.redis_url is required when store.backend = \"redis\"")]
    MissingRedisUrl,

    #[error("routing rule #{index} has an empty {field}")]
    EmptyRoutingField { index: usize, field: &'static str },

    #[error("routing.default_provider must not be empty")]
    EmptyDefaultProvider,

    #[error("price for {scope} must be finite and non-negative")]
    InvalidPrice { scope: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_limit(&mut errors, "default", config.budget.default_limit);
    for (tenant, limit) in &config.budget.tenant_limits {
        check_limit(&mut errors, &format!("tenant '{tenant}'"), *limit);
    }
    if config.budget.period_secs == 0 {
        errors.push(ValidationError::ZeroPeriod);
    }
    if config.budget.key_prefix.is_empty() {
        errors.push(ValidationError::EmptyKeyPrefix);
    }

    check_breaker(&mut errors, "defaults", &config.breaker.defaults);
    for (provider, settings) in &config.breaker.overrides {
        check_breaker(&mut errors, &format!("provider '{provider}'"), settings);
    }

    let redis_url = config.store.redis_url.as_deref().unwrap_or_default();
    if config.store.backend == StoreBackend::Redis && redis_url.is_empty() {
        errors.push(ValidationError::MissingRedisUrl);
    }

    if config.routing.default_provider.is_empty() {
        errors.push(ValidationError::EmptyDefaultProvider);
    }
    for (index, rule) in config.routing.rules.iter().enumerate() {
        if rule.model_prefix.is_empty() {
            errors.push(ValidationError::EmptyRoutingField {
                index,
                field: "model_prefix",
            });
        }
        if rule.provider.is_empty() {
            errors.push(ValidationError::EmptyRoutingField {
                index,
                field: "provider",
            });
        }
    }

    let fallback = &config.pricing.fallback;
    if !valid_amount(fallback.input_per_million) || !valid_amount(fallback.output_per_million) {
        errors.push(ValidationError::InvalidPrice {
            scope: "fallback".to_string(),
        });
    }
    for (model, price) in &config.pricing.models {
        if !valid_amount(price.input_per_million) || !valid_amount(price.output_per_million) {
            errors.push(ValidationError::InvalidPrice {
                scope: format!("model '{model}'"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn valid_amount(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn check_limit(errors: &mut Vec<ValidationError>, scope: &str, value: f64) {
    if !valid_amount(value) {
        errors.push(ValidationError::InvalidLimit {
            scope: scope.to_string(),
            value,
        });
    }
}

fn check_breaker(errors: &mut Vec<ValidationError>, scope: &str, settings: &BreakerSettings) {
    if settings.fail_max == 0 {
        errors.push(ValidationError::ZeroFailMax {
            scope: scope.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GateConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GateConfig::default();
        config.budget.default_limit = -1.0;
        config.budget.period_secs = 0;
        config.breaker.defaults.fail_max = 0;
        config.store.backend = StoreBackend::Redis;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroPeriod));
        assert!(errors.contains(&ValidationError::MissingRedisUrl));
    }

    #[test]
    fn test_rejects_nan_tenant_limit() {
        let mut config = GateConfig::default();
        config.budget.tenant_limits.insert("acme".into(), f64::NAN);
        let errors = validate_config(&config).unwrap_err();
        let scope = match &errors[0] {
            ValidationError::InvalidLimit { scope, .. } => scope.as_str(),
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(scope, "tenant 'acme'");
    }
}
