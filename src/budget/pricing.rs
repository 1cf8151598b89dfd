//! Cost estimation for outbound calls.
//!
//! The gate charges an estimate up front, so the estimate uses the request's
//! `max_output_tokens` as the worst case for completion length.

use crate::config::{ModelPrice, PricingConfig};

/// Model prices matched by case-insensitive name prefix.
#[derive(Debug, Clone)]
pub struct PricingTable {
    /// Sorted longest prefix first so the most specific entry wins.
    entries: Vec<(String, ModelPrice)>,
    fallback: ModelPrice,
}

impl PricingTable {
    /// Build a table from configuration.
    pub fn from_config(config: &PricingConfig) -> Self {
        let mut entries: Vec<(String, ModelPrice)> = config
            .models
            .iter()
            .map(|(prefix, price)| (prefix.to_lowercase(), *price))
            .collect();
        entries.sort_by(|(a, _), (b, _)| (b.len(), a).cmp(&(a.len(), b)));

        Self {
            entries,
            fallback: config.fallback,
        }
    }

    /// Price that applies to `model`.
    pub fn price_for(&self, model: &str) -> ModelPrice {
        let lower = model.to_lowercase();
        self.entries
            .iter()
            .find(|(prefix, _)| lower.starts_with(prefix.as_str()))
            .map(|(_, price)| *price)
            .unwrap_or(self.fallback)
    }

    /// Worst-case cost of a call in currency units.
    pub fn estimate(&self, model: &str, input_tokens: u64, max_output_tokens: u64) -> f64 {
        let price = self.price_for(model);
        let input = (input_tokens as f64 / 1_000_000.0) * price.input_per_million;
        let output = (max_output_tokens as f64 / 1_000_000.0) * price.output_per_million;
        input + output
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(input_per_million: f64, output_per_million: f64) -> ModelPrice {
        ModelPrice {
            input_per_million,
            output_per_million,
        }
    }

    fn table() -> PricingTable {
        let mut config = PricingConfig::default();
        config.models.insert("gpt-4".into(), price(10.0, 30.0));
        config.models.insert("gpt-4o".into(), price(2.5, 10.0));
        config.fallback = price(1.0, 1.0);
        PricingTable::from_config(&config)
    }

    #[test]
    fn test_longest_prefix_wins() {
        let t = table();
        assert_eq!(t.price_for("gpt-4o-mini").input_per_million, 2.5);
        assert_eq!(t.price_for("GPT-4-turbo").input_per_million, 10.0);
        assert_eq!(t.price_for("llama-3").input_per_million, 1.0);
    }

    #[test]
    fn test_estimate() {
        let t = table();
        // 1M input at 2.5 + 0.5M output at 10.0
        let cost = t.estimate("gpt-4o", 1_000_000, 500_000);
        assert!((cost - 7.5).abs() < 1e-9);
        assert_eq!(t.estimate("gpt-4o", 0, 0), 0.0);
    }
}
