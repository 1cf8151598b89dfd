//! Model name → provider resolution.
//!
//! # Design Decisions
//! - Matching is case-insensitive on the model name prefix
//! - Longest matching prefix wins, independent of rule order
//! - Unknown models go to the default provider rather than failing

use crate::config::RoutingConfig;

/// Resolves the dependency key (provider) a model's calls are charged against.
#[derive(Debug, Clone)]
pub struct ProviderResolver {
    /// (lowercased prefix, provider), longest prefix first.
    rules: Vec<(String, String)>,
    default_provider: String,
}

impl ProviderResolver {
    pub fn from_config(config: &RoutingConfig) -> Self {
        let mut rules: Vec<(String, String)> = config
            .rules
            .iter()
            .map(|r| (r.model_prefix.to_lowercase(), r.provider.clone()))
            .collect();
        // Stable sort keeps config order among equal-length prefixes
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            rules,
            default_provider: config.default_provider.clone(),
        }
    }

    /// Provider for `model`.
    pub fn resolve(&self, model: &str) -> &str {
        let lower = model.to_lowercase();
        self.rules
            .iter()
            .find(|(prefix, _)| lower.starts_with(prefix.as_str()))
            .map(|(_, provider)| provider.as_str())
            .unwrap_or(self.default_provider.as_str())
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }
}

impl Default for ProviderResolver {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderRule;

    fn rule(prefix: &str, provider: &str) -> ProviderRule {
        ProviderRule {
            model_prefix: prefix.to_string(),
            provider: provider.to_string(),
        }
    }

    #[test]
    fn test_default_rules() {
        let resolver = ProviderResolver::default();
        assert_eq!(resolver.resolve("gpt-4o-mini"), "openai");
        assert_eq!(resolver.resolve("Claude-3-5-Sonnet"), "anthropic");
        assert_eq!(resolver.resolve("gemini-1.5-pro"), "google");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let config = RoutingConfig {
            default_provider: "fallback".into(),
            rules: vec![rule("gpt-", "openai"), rule("gpt-4o", "azure")],
        };
        let resolver = ProviderResolver::from_config(&config);
        assert_eq!(resolver.resolve("gpt-4o"), "azure");
        assert_eq!(resolver.resolve("gpt-3.5-turbo"), "openai");
    }

    #[test]
    fn test_unknown_model_uses_default() {
        let config = RoutingConfig {
            default_provider: "ollama".into(),
            rules: vec![],
        };
        let resolver = ProviderResolver::from_config(&config);
        assert_eq!(resolver.resolve("llama3"), "ollama");
        assert_eq!(resolver.default_provider(), "ollama");
    }
}
