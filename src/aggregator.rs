//! Signal aggregator (C10, spec.md §4.10).
//!
//! Rolls a list of per-signal [`SignalScore`]s into per-dimension scores
//! (0-10) and an overall Trust Stack score (0-100), applying knockout caps,
//! core-deficit caps and coverage penalties from a trust-signals
//! configuration. `scoring/aggregator.py` itself was not retrieved into
//! `original_source/` (only referenced by `core/run_manager.py`'s
//! `_calculate_averages`, which names the same three penalties this module
//! implements), so the algorithm below follows spec.md §4.10 directly;
//! `run_manager.py`'s comments confirm the cap values (4.0 knockout, 6.0
//! core-deficit).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Dimension, SignalScore};

/// Per-dimension entry in the trust-signals configuration (spec.md §4.10).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalConfig {
    pub weight: f64,
    #[serde(default)]
    pub knockout: bool,
    #[serde(default)]
    pub core: bool,
}

/// One dimension's worth of named signal configuration plus its coverage
/// floor and weight in the overall score.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DimensionConfig {
    pub signals: HashMap<String, SignalConfig>,
    #[serde(default = "default_min_coverage")]
    pub min_coverage: usize,
    pub weight: f64,
}

fn default_min_coverage() -> usize {
    1
}

/// Trust-signals configuration: one [`DimensionConfig`] per dimension, loaded
/// from `config/trust_signals.yml` at startup (spec.md "Configuration").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrustSignalsConfig {
    pub dimensions: HashMap<String, DimensionConfig>,
}

impl TrustSignalsConfig {
    fn dimension(&self, dimension: Dimension) -> Option<&DimensionConfig> {
        self.dimensions.get(dimension.as_str())
    }
}

/// Dimension score plus the evidence used to produce it.
#[derive(Debug, Clone, Serialize)]
pub struct DimensionResult {
    pub dimension: Dimension,
    pub score: f64,
    pub knockout_triggered: bool,
    pub core_deficit_triggered: bool,
    pub coverage_ratio: f64,
    pub signal_count: usize,
}

/// Final aggregation output: five dimension results plus the overall score.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
    pub dimensions: Vec<DimensionResult>,
    pub overall_score: f64,
}

/// Aggregate `signals` per spec.md §4.10's five-step algorithm.
pub fn aggregate(signals: &[SignalScore], config: &TrustSignalsConfig) -> AggregationResult {
    let mut dimension_results = Vec::with_capacity(Dimension::ALL.len());

    for dimension in Dimension::ALL {
        let dim_signals: Vec<&SignalScore> = signals.iter().filter(|s| s.dimension == dimension).collect();
        let dim_config = config.dimension(dimension);

        let result = match dim_config {
            Some(dim_config) => score_dimension(dimension, &dim_signals, dim_config),
            None => DimensionResult {
                dimension,
                score: 0.0,
                knockout_triggered: false,
                core_deficit_triggered: false,
                coverage_ratio: 0.0,
                signal_count: dim_signals.len(),
            },
        };
        dimension_results.push(result);
    }

    let overall_score = overall_trust_score(&dimension_results, config);

    AggregationResult { dimensions: dimension_results, overall_score }
}

fn score_dimension(dimension: Dimension, signals: &[&SignalScore], config: &DimensionConfig) -> DimensionResult {
    if signals.is_empty() {
        return DimensionResult {
            dimension,
            score: 0.0,
            knockout_triggered: false,
            core_deficit_triggered: false,
            coverage_ratio: 0.0,
            signal_count: 0,
        };
    }

    // Step 1: weighted mean of value*confidence, normalised by summed effective weight.
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for signal in signals {
        let signal_weight = config.signals.get(&signal.id).map(|c| c.weight).unwrap_or(signal.weight);
        let effective_weight = signal_weight * signal.confidence;
        weighted_sum += signal.value * effective_weight;
        weight_sum += effective_weight;
    }
    let mut score = if weight_sum > 0.0 { weighted_sum / weight_sum } else { 0.0 };

    // Step 2: knockout cap.
    let knockout_triggered = signals.iter().any(|s| {
        config.signals.get(&s.id).map(|c| c.knockout).unwrap_or(false) && s.value < 4.0
    });
    if knockout_triggered {
        score = score.min(4.0);
    }

    // Step 3: core-deficit cap.
    let core_deficit_triggered = signals.iter().any(|s| {
        config.signals.get(&s.id).map(|c| c.core).unwrap_or(false) && s.value < 3.0
    });
    if core_deficit_triggered {
        score = score.min(6.0);
    }

    // Step 4: coverage penalty.
    let coverage_ratio = (signals.len() as f64 / config.min_coverage.max(1) as f64).min(1.0);
    if signals.len() < config.min_coverage {
        score *= coverage_ratio;
    }

    DimensionResult {
        dimension,
        score,
        knockout_triggered,
        core_deficit_triggered,
        coverage_ratio,
        signal_count: signals.len(),
    }
}

/// Weighted mean of the five dimension scores, scaled to 0-100 (spec.md §4.10).
fn overall_trust_score(results: &[DimensionResult], config: &TrustSignalsConfig) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for result in results {
        let weight = config.dimension(result.dimension).map(|d| d.weight).unwrap_or(1.0);
        weighted_sum += result.score * weight;
        weight_sum += weight;
    }
    if weight_sum == 0.0 {
        return 0.0;
    }
    (weighted_sum / weight_sum) * 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(id: &str, dimension: Dimension, value: f64, weight: f64, confidence: f64) -> SignalScore {
        SignalScore {
            id: id.to_string(),
            label: id.to_string(),
            dimension,
            value,
            weight,
            evidence: vec![],
            rationale: String::new(),
            confidence,
        }
    }

    fn uniform_config(signal_ids: &[(&str, f64, bool, bool)], min_coverage: usize, dim_weight: f64) -> DimensionConfig {
        let mut signals = HashMap::new();
        for (id, weight, knockout, core) in signal_ids {
            signals.insert(id.to_string(), SignalConfig { weight: *weight, knockout: *knockout, core: *core });
        }
        DimensionConfig { signals, min_coverage, weight: dim_weight }
    }

    fn config_with(dimension: Dimension, dim_config: DimensionConfig) -> TrustSignalsConfig {
        let mut dimensions = HashMap::new();
        dimensions.insert(dimension.as_str().to_string(), dim_config);
        TrustSignalsConfig { dimensions }
    }

    #[test]
    fn s6_knockout_caps_dimension_at_four() {
        let signals = vec![
            signal("a", Dimension::Provenance, 8.0, 0.2, 1.0),
            signal("b", Dimension::Provenance, 8.0, 0.2, 1.0),
            signal("c", Dimension::Provenance, 8.0, 0.2, 1.0),
            signal("d", Dimension::Provenance, 8.0, 0.2, 1.0),
            signal("e", Dimension::Provenance, 2.0, 0.2, 1.0),
        ];
        let dim_config = uniform_config(
            &[("a", 0.2, false, false), ("b", 0.2, false, false), ("c", 0.2, false, false), ("d", 0.2, false, false), ("e", 0.2, true, false)],
            1,
            1.0,
        );
        let config = config_with(Dimension::Provenance, dim_config);
        let result = aggregate(&signals, &config);
        let provenance = result.dimensions.iter().find(|d| d.dimension == Dimension::Provenance).unwrap();
        assert_eq!(provenance.score, 4.0);
        assert!(provenance.knockout_triggered);
    }

    #[test]
    fn core_deficit_caps_dimension_at_six() {
        let signals = vec![
            signal("a", Dimension::Transparency, 9.0, 0.5, 1.0),
            signal("b", Dimension::Transparency, 2.0, 0.5, 1.0),
        ];
        let dim_config = uniform_config(&[("a", 0.5, false, false), ("b", 0.5, false, true)], 1, 1.0);
        let config = config_with(Dimension::Transparency, dim_config);
        let result = aggregate(&signals, &config);
        let transparency = result.dimensions.iter().find(|d| d.dimension == Dimension::Transparency).unwrap();
        assert_eq!(transparency.score, 6.0);
        assert!(transparency.core_deficit_triggered);
    }

    #[test]
    fn coverage_penalty_scales_score_down() {
        let signals = vec![signal("a", Dimension::Coherence, 10.0, 1.0, 1.0)];
        let dim_config = uniform_config(&[("a", 1.0, false, false)], 4, 1.0);
        let config = config_with(Dimension::Coherence, dim_config);
        let result = aggregate(&signals, &config);
        let coherence = result.dimensions.iter().find(|d| d.dimension == Dimension::Coherence).unwrap();
        assert_eq!(coherence.coverage_ratio, 0.25);
        assert_eq!(coherence.score, 2.5);
    }

    #[test]
    fn no_signals_in_a_dimension_scores_zero() {
        let config = config_with(Dimension::Resonance, uniform_config(&[("x", 1.0, false, false)], 1, 1.0));
        let result = aggregate(&[], &config);
        let resonance = result.dimensions.iter().find(|d| d.dimension == Dimension::Resonance).unwrap();
        assert_eq!(resonance.score, 0.0);
        assert_eq!(resonance.signal_count, 0);
    }

    #[test]
    fn overall_score_is_weighted_mean_scaled_to_100() {
        let mut dimensions = HashMap::new();
        for dimension in Dimension::ALL {
            dimensions.insert(dimension.as_str().to_string(), uniform_config(&[("s", 1.0, false, false)], 1, 1.0));
        }
        let config = TrustSignalsConfig { dimensions };
        let signals: Vec<SignalScore> = Dimension::ALL.iter().map(|d| signal("s", *d, 8.0, 1.0, 1.0)).collect();
        let result = aggregate(&signals, &config);
        assert!((result.overall_score - 80.0).abs() < 1e-9);
    }
}
