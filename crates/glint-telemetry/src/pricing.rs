//! Per-provider, per-model token prices

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Prices for one provider, in currency units per 1000 tokens
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderPricing {
    /// Used when no model prefix matches
    #[serde(default)]
    pub default: Option<f64>,
    /// Model-name prefix to price
    #[serde(default)]
    pub models: BTreeMap<String, f64>,
}

impl ProviderPricing {
    pub fn with_default(mut self, price: f64) -> Self {
        self.default = Some(price);
        self
    }

    pub fn with_model(mut self, prefix: impl Into<String>, price: f64) -> Self {
        self.models.insert(prefix.into(), price);
        self
    }

    /// Longest matching model prefix, then the provider default
    fn price_for(&self, model: &str) -> Option<f64> {
        self.models
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, price)| *price)
            .or(self.default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable {
    providers: HashMap<String, ProviderPricing>,
}

impl PricingTable {
    /// A table with no prices at all
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn set(&mut self, provider: impl Into<String>, pricing: ProviderPricing) {
        self.providers.insert(provider.into().to_lowercase(), pricing);
    }

    /// Price per 1000 tokens; 0 when nothing is known
    pub fn price_per_1k(&self, provider: &str, model: &str) -> f64 {
        self.providers
            .get(&provider.to_lowercase())
            .and_then(|pricing| pricing.price_for(model))
            .unwrap_or(0.0)
    }

    /// Layer `overrides` on top: provider defaults replace, model prices merge
    pub fn merge(&mut self, overrides: PricingTable) {
        for (provider, pricing) in overrides.providers {
            let entry = self.providers.entry(provider.to_lowercase()).or_default();
            if pricing.default.is_some() {
                entry.default = pricing.default;
            }
            entry.models.extend(pricing.models);
        }
    }

    pub fn merged(mut self, overrides: PricingTable) -> Self {
        self.merge(overrides);
        self
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.set(
            "openai",
            ProviderPricing::default()
                .with_default(0.002)
                .with_model("gpt-3.5-turbo", 0.0015)
                .with_model("gpt-4", 0.03)
                .with_model("gpt-4-turbo", 0.01)
                .with_model("gpt-4o", 0.005)
                .with_model("gpt-4o-mini", 0.0003),
        );
        table.set(
            "anthropic",
            ProviderPricing::default()
                .with_default(0.008)
                .with_model("claude-3-haiku", 0.00075)
                .with_model("claude-3-5-haiku", 0.0024)
                .with_model("claude-3-5-sonnet", 0.009)
                .with_model("claude-sonnet-4", 0.009)
                .with_model("claude-opus-4", 0.045),
        );
        table.set("openrouter", ProviderPricing::default().with_default(0.002));
        table.set("ollama", ProviderPricing::default().with_default(0.0));
        table
    }
}
