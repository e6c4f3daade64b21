//! LLM cost tracking (part of C11, spec.md §4.11's scoring pipeline).
//!
//! Tracks token usage across every LLM call in a run and reports a per-model
//! cost breakdown plus quota warnings. Grounded on
//! `original_source/scoring/cost_tracker.py` field-for-field: same default
//! pricing table, same quota thresholds, same prefix-match pricing lookup.
//! The Python original is a process-wide singleton (`CostTracker.__new__`);
//! this crate keeps that shape with a `once_cell::Lazy<Mutex<..>>` global but
//! also exposes a plain constructor so an orchestrator can hold one tracker
//! per run instead, avoiding cross-run bleed under concurrent runs.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Deserialize;

#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

fn default_pricing_table() -> HashMap<&'static str, ModelPricing> {
    [
        ("gpt-4o", (2.50, 10.00)),
        ("gpt-4o-mini", (0.15, 0.60)),
        ("gpt-3.5-turbo", (0.50, 1.50)),
        ("claude-3-5-sonnet-20241022", (3.00, 15.00)),
        ("claude-3-5-haiku-20241022", (1.00, 5.00)),
        ("claude-3-opus-20240229", (15.00, 75.00)),
        ("gemini-1.5-pro", (1.25, 5.00)),
        ("gemini-1.5-flash", (0.075, 0.30)),
        ("deepseek-chat", (0.14, 0.28)),
    ]
    .into_iter()
    .map(|(name, (input, output))| (name, ModelPricing { input_per_million: input, output_per_million: output }))
    .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct Quotas {
    pub warn_input_tokens: u64,
    pub warn_output_tokens: u64,
    pub warn_cost_usd: f64,
}

impl Default for Quotas {
    fn default() -> Self {
        Self { warn_input_tokens: 100_000, warn_output_tokens: 50_000, warn_cost_usd: 1.00 }
    }
}

/// On-disk shape of `config/llm_pricing.yml`.
#[derive(Debug, Deserialize)]
pub struct PricingFile {
    #[serde(default)]
    pub models: HashMap<String, PricingEntry>,
    #[serde(default)]
    pub quotas: Option<QuotasFile>,
}

#[derive(Debug, Deserialize)]
pub struct PricingEntry {
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Deserialize)]
pub struct QuotasFile {
    pub warn_input_tokens: Option<u64>,
    pub warn_output_tokens: Option<u64>,
    pub warn_cost_usd: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
    calls: u64,
}

#[derive(Debug, Clone)]
pub struct ModelSummary {
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub calls: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Totals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub calls: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone)]
pub struct CostSummary {
    pub models: Vec<ModelSummary>,
    pub totals: Totals,
}

pub struct CostTracker {
    usage: HashMap<String, Usage>,
    pricing: HashMap<String, ModelPricing>,
    quotas: Quotas,
}

impl CostTracker {
    pub fn new() -> Self {
        let pricing = default_pricing_table().into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Self { usage: HashMap::new(), pricing, quotas: Quotas::default() }
    }

    /// Build a tracker from a parsed `llm_pricing.yml`, falling back to the
    /// default table for any field left absent.
    pub fn from_pricing_file(file: PricingFile) -> Self {
        let mut tracker = Self::new();
        for (model, entry) in file.models {
            tracker.pricing.insert(model, ModelPricing { input_per_million: entry.input, output_per_million: entry.output });
        }
        if let Some(quotas) = file.quotas {
            if let Some(v) = quotas.warn_input_tokens {
                tracker.quotas.warn_input_tokens = v;
            }
            if let Some(v) = quotas.warn_output_tokens {
                tracker.quotas.warn_output_tokens = v;
            }
            if let Some(v) = quotas.warn_cost_usd {
                tracker.quotas.warn_cost_usd = v;
            }
        }
        tracker
    }

    pub fn record(&mut self, model: &str, prompt_tokens: u64, completion_tokens: u64) {
        let entry = self.usage.entry(model.to_string()).or_default();
        entry.prompt_tokens += prompt_tokens;
        entry.completion_tokens += completion_tokens;
        entry.calls += 1;
        tracing::debug!(model, prompt_tokens, completion_tokens, "recorded LLM usage");
    }

    fn model_pricing(&self, model: &str) -> ModelPricing {
        if let Some(pricing) = self.pricing.get(model) {
            return *pricing;
        }
        let mut known: Vec<&String> = self.pricing.keys().collect();
        known.sort_by_key(|k| std::cmp::Reverse(k.len()));
        for candidate in known {
            if model.starts_with(candidate.as_str()) {
                return self.pricing[candidate];
            }
        }
        tracing::warn!(model, "unknown model pricing, using gpt-4o-mini rates");
        self.pricing
            .get("gpt-4o-mini")
            .copied()
            .unwrap_or(ModelPricing { input_per_million: 0.15, output_per_million: 0.60 })
    }

    fn calculate_cost(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let pricing = self.model_pricing(model);
        let input_cost = (prompt_tokens as f64 / 1_000_000.0) * pricing.input_per_million;
        let output_cost = (completion_tokens as f64 / 1_000_000.0) * pricing.output_per_million;
        input_cost + output_cost
    }

    pub fn summary(&self) -> CostSummary {
        let mut models = Vec::with_capacity(self.usage.len());
        let mut totals = Totals::default();

        for (model, usage) in &self.usage {
            let cost = self.calculate_cost(model, usage.prompt_tokens, usage.completion_tokens);
            let total_tokens = usage.prompt_tokens + usage.completion_tokens;

            models.push(ModelSummary {
                model: model.clone(),
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens,
                calls: usage.calls,
                cost_usd: cost,
            });

            totals.prompt_tokens += usage.prompt_tokens;
            totals.completion_tokens += usage.completion_tokens;
            totals.total_tokens += total_tokens;
            totals.calls += usage.calls;
            totals.cost_usd += cost;
        }

        models.sort_by(|a, b| a.model.cmp(&b.model));
        CostSummary { models, totals }
    }

    /// Log a warning line for each quota exceeded (spec.md §4.11 ambient
    /// stack: logged via `tracing`, not printed to stdout, unlike the
    /// original's `print()` calls).
    pub fn check_quotas(&self) -> Vec<String> {
        let summary = self.summary();
        let mut warnings = Vec::new();

        if summary.totals.prompt_tokens > self.quotas.warn_input_tokens {
            let msg = format!(
                "input tokens ({}) exceeded threshold ({})",
                summary.totals.prompt_tokens, self.quotas.warn_input_tokens
            );
            tracing::warn!("{msg}");
            warnings.push(msg);
        }
        if summary.totals.completion_tokens > self.quotas.warn_output_tokens {
            let msg = format!(
                "output tokens ({}) exceeded threshold ({})",
                summary.totals.completion_tokens, self.quotas.warn_output_tokens
            );
            tracing::warn!("{msg}");
            warnings.push(msg);
        }
        if summary.totals.cost_usd > self.quotas.warn_cost_usd {
            let msg = format!("estimated cost (${:.4}) exceeded threshold (${:.2})", summary.totals.cost_usd, self.quotas.warn_cost_usd);
            tracing::warn!("{msg}");
            warnings.push(msg);
        }

        warnings
    }

    pub fn reset(&mut self) {
        self.usage.clear();
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide tracker, mirroring the Python original's module-level
/// singleton for callers that don't thread a per-run tracker explicitly.
pub static GLOBAL_COST_TRACKER: Lazy<Mutex<CostTracker>> = Lazy::new(|| Mutex::new(CostTracker::new()));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_model_match_uses_its_own_pricing() {
        let tracker = CostTracker::new();
        let cost = tracker.calculate_cost("gpt-4o-mini", 1_000_000, 1_000_000);
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn prefix_match_prefers_longest_known_prefix() {
        let mut tracker = CostTracker::new();
        tracker.pricing.insert("claude-3".to_string(), ModelPricing { input_per_million: 1.0, output_per_million: 1.0 });
        let pricing = tracker.model_pricing("claude-3-opus-20240229-preview");
        assert_eq!(pricing.input_per_million, 15.00);
    }

    #[test]
    fn unknown_model_falls_back_to_mini_rates() {
        let tracker = CostTracker::new();
        let pricing = tracker.model_pricing("some-unheard-of-model");
        assert_eq!(pricing.input_per_million, 0.15);
    }

    #[test]
    fn record_accumulates_across_calls() {
        let mut tracker = CostTracker::new();
        tracker.record("gpt-4o-mini", 100, 50);
        tracker.record("gpt-4o-mini", 200, 75);
        let summary = tracker.summary();
        let model = summary.models.iter().find(|m| m.model == "gpt-4o-mini").unwrap();
        assert_eq!(model.prompt_tokens, 300);
        assert_eq!(model.completion_tokens, 125);
        assert_eq!(model.calls, 2);
    }

    #[test]
    fn check_quotas_warns_when_cost_threshold_exceeded() {
        let mut tracker = CostTracker::new();
        tracker.quotas.warn_cost_usd = 0.0001;
        tracker.record("gpt-4o", 10_000, 10_000);
        let warnings = tracker.check_quotas();
        assert!(warnings.iter().any(|w| w.contains("cost")));
    }

    #[test]
    fn reset_clears_usage() {
        let mut tracker = CostTracker::new();
        tracker.record("gpt-4o-mini", 100, 50);
        tracker.reset();
        assert!(tracker.summary().models.is_empty());
    }
}
