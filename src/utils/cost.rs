// ABOUTME: Per-model token pricing table and cost conversion
// Costs are always recomputed from raw token counts so rate edits re-price history

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Price per single token in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
}

impl ModelRates {
    /// Create rates from cost per million tokens (the common published format).
    pub fn per_million(input: f64, output: f64) -> Self {
        Self {
            input: input / 1_000_000.0,
            output: output / 1_000_000.0,
        }
    }
}

/// Rate table with a default fallback for unknown models.
#[derive(Debug, Clone)]
pub struct CostModel {
    rates: HashMap<String, ModelRates>,
    default_rates: ModelRates,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CostModel {
    pub fn new() -> Self {
        let mut rates = HashMap::new();

        for model in ["claude-opus-4-6", "claude-opus-4.6"] {
            rates.insert(model.to_string(), ModelRates::per_million(15.0, 75.0));
        }
        for model in [
            "claude-sonnet-4-6",
            "claude-sonnet-4.6",
            "claude-sonnet-4-5",
            "claude-sonnet-4.5",
        ] {
            rates.insert(model.to_string(), ModelRates::per_million(3.0, 15.0));
        }
        for model in ["claude-haiku-4-5", "claude-haiku-4.5"] {
            rates.insert(model.to_string(), ModelRates::per_million(0.8, 4.0));
        }
        rates.insert(
            "gemini-3-pro".to_string(),
            ModelRates::per_million(1.25, 10.0),
        );

        Self {
            rates,
            default_rates: ModelRates::per_million(3.0, 15.0),
        }
    }

    /// Build a cost model from an explicit table, e.g. for tests or a
    /// user-supplied pricing file.
    pub fn with_rates(rates: HashMap<String, ModelRates>, default_rates: ModelRates) -> Self {
        Self {
            rates,
            default_rates,
        }
    }

    /// Load a `{ "model-name": { "input": .., "output": .. } }` table.
    /// Rates in the file are $/token.
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> crate::utils::error::Result<Self> {
        let content = fs::read_to_string(path)?;
        let rates: HashMap<String, ModelRates> = serde_json::from_str(&content)?;
        Ok(Self {
            rates,
            default_rates: ModelRates::per_million(3.0, 15.0),
        })
    }

    pub fn rates_for(&self, model: &str) -> ModelRates {
        self.rates
            .get(model)
            .copied()
            .unwrap_or(self.default_rates)
    }

    /// cost = input_tokens * rate.input + output_tokens * rate.output
    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let rates = self.rates_for(model);
        input_tokens as f64 * rates.input + output_tokens as f64 * rates.output
    }

    /// Format cost as a USD string, keeping precision for sub-cent amounts.
    pub fn format_cost(cost: f64) -> String {
        if cost < 0.01 {
            format!("${:.4}", cost)
        } else {
            format!("${:.2}", cost)
        }
    }
}

/// Short display label for a model id ("claude-opus-4-6" -> "Opus").
pub fn short_model(model: &str) -> String {
    let lower = model.to_lowercase();
    if lower.contains("opus") {
        "Opus".to_string()
    } else if lower.contains("sonnet") {
        "Son".to_string()
    } else if lower.contains("haiku") {
        "Hai".to_string()
    } else if lower.contains("gemini") {
        "Gem".to_string()
    } else {
        let trimmed = lower
            .trim_start_matches("claude-")
            .trim_start_matches("gemini-");
        trimmed.chars().take(4).collect()
    }
}

/// Expand the shorthand aliases used in Task dispatch events to full ids.
pub fn normalize_model(model: &str) -> String {
    match model {
        "opus" => "claude-opus-4-6".to_string(),
        "sonnet" => "claude-sonnet-4-5".to_string(),
        "haiku" => "claude-haiku-4-5".to_string(),
        other => other.to_string(),
    }
}
