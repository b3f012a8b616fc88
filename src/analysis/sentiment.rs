//! Sentiment Bias Analyzer (C4): per-entity masked-vs-unmasked contrast,
//! category-level aggregation. Grounded in
//! `examples/original_source/src/analysis/bias_analysis_engine.py`
//! (`_analyze_sentiment_bias_for_category` and friends) and
//! `bias_metrics.py::compute_bias_metrics`.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::model::input::SentimentSubcategory;
use crate::model::output::{BiasDirection, Metric};
use crate::reliability::MetricKind;
use crate::rounding::{round3, round4};
use crate::stats::kernel::{self, CorrectionMethod, EffectMagnitude};
use crate::stats::BootstrapRng;

const BOOTSTRAP_ITERATIONS: usize = 10_000;
const CATEGORY_BIAS_THRESHOLD: f64 = 0.1;
const SIGNIFICANCE_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Serialize)]
pub struct BasicMetrics {
    pub raw_delta: f64,
    pub normalized_bias_index: f64,
    pub delta_values: Vec<f64>,
    pub execution_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticalSignificance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_test_p_value: Option<f64>,
    pub significance_level: String,
    pub available: bool,
    pub test_power: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_p_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EffectSize {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cliffs_delta: Option<f64>,
    pub effect_magnitude: String,
    pub practical_significance: bool,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceInterval {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci_lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ci_upper: Option<f64>,
    pub confidence_level: f64,
    pub available: bool,
    pub interpretation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StabilityMetrics {
    pub stability_score: f64,
    pub coefficient_of_variation: f64,
    pub reliability: String,
    pub interpretation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeverityComponents {
    pub bias_index: f64,
    pub cliffs_delta: f64,
    pub p_value: f64,
    pub stability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeverityInfo {
    pub severity_score: f64,
    pub components: SeverityComponents,
    pub interpretation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Interpretation {
    pub bias_direction: BiasDirection,
    pub bias_strength: String,
    pub confidence_note: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySentimentResult {
    pub entity: String,
    pub basic_metrics: BasicMetrics,
    pub statistical_significance: StatisticalSignificance,
    pub effect_size: EffectSize,
    pub confidence_interval: ConfidenceInterval,
    pub stability_metrics: StabilityMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_score: Option<SeverityInfo>,
    pub interpretation: Interpretation,
    pub bias_index: f64,
    pub bias_rank: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryLevelAnalysis {
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
    pub bias_range: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability_aggregate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcategorySentimentResult {
    pub execution_count: usize,
    pub entities: Vec<EntitySentimentResult>,
    pub category_level_analysis: CategoryLevelAnalysis,
}

pub type SentimentBiasAnalysis = BTreeMap<String, BTreeMap<String, SubcategorySentimentResult>>;

fn in_range(values: &[f64]) -> bool {
    values.iter().all(|v| (1.0..=5.0).contains(v))
}

fn bias_strength_band(bi: f64) -> &'static str {
    let abs = bi.abs();
    if abs > 1.5 {
        "very strong"
    } else if abs > 0.8 {
        "strong"
    } else if abs > 0.3 {
        "moderate"
    } else {
        "mild"
    }
}

struct RawEntity {
    name: String,
    delta_values: Vec<f64>,
    raw_delta: f64,
}

pub fn analyze_sentiment_bias(
    input: &BTreeMap<String, BTreeMap<String, SentimentSubcategory>>,
    rng_root: &BootstrapRng,
) -> SentimentBiasAnalysis {
    let mut out: SentimentBiasAnalysis = BTreeMap::new();
    for (category, subcats) in input {
        let mut cat_out = BTreeMap::new();
        for (subcategory, sub) in subcats {
            let masked = sub.resolved_masked_values();
            if !in_range(&masked) {
                warn!(category, subcategory, "masked_values out of [1,5], skipping subcategory");
                continue;
            }

            let mut raw_entities = Vec::new();
            for (entity, entity_data) in &sub.entities {
                let unmasked = entity_data.resolved_unmasked_values();
                if unmasked.is_empty() {
                    warn!(category, subcategory, entity, "missing unmasked_values, skipping entity");
                    continue;
                }
                if !in_range(&unmasked) {
                    warn!(category, subcategory, entity, "unmasked_values out of [1,5], skipping entity");
                    continue;
                }
                let n = masked.len().min(unmasked.len());
                if n == 0 {
                    continue;
                }
                let masked_aligned = &masked[..n];
                let unmasked_aligned = &unmasked[..n];
                let delta_values: Vec<f64> = (0..n)
                    .map(|i| unmasked_aligned[i] - masked_aligned[i])
                    .collect();
                let raw_delta = kernel::mean(&delta_values);
                raw_entities.push(RawEntity {
                    name: entity.clone(),
                    delta_values,
                    raw_delta,
                });
            }

            if raw_entities.is_empty() {
                warn!(category, subcategory, "no entities survived validation, skipping subcategory");
                continue;
            }

            let raw_deltas: Vec<f64> = raw_entities.iter().map(|e| e.raw_delta).collect();
            let bis = kernel::normalized_bias_indices(&raw_deltas);

            // First pass: everything except BH-corrected significance.
            struct Pending {
                entity: String,
                delta_values: Vec<f64>,
                raw_delta: f64,
                bi: f64,
                n: usize,
                sign_p: Option<f64>,
                cliffs_d: Option<f64>,
                ci: Option<(f64, f64)>,
                stability: kernel::StabilityResult,
            }

            let mut pending = Vec::new();
            for (i, e) in raw_entities.iter().enumerate() {
                let n = e.delta_values.len();
                let masked_slice = &masked[..n];
                // unmasked_i = masked_i + delta_i, reconstructed for the
                // pairwise comparisons that cliffs_delta/sign_test need.
                let unmasked_slice: Vec<f64> = (0..n).map(|j| masked_slice[j] + e.delta_values[j]).collect();

                let sign_p = if MetricKind::SignTestPValue.is_met_by(n) {
                    Some(kernel::sign_test_p_value(masked_slice, &unmasked_slice))
                } else {
                    None
                };
                let cliffs_d = if MetricKind::CliffsDelta.is_met_by(n) {
                    Some(kernel::cliffs_delta(masked_slice, &unmasked_slice))
                } else {
                    None
                };
                let ci = if MetricKind::BootstrapCi.is_met_by(n) {
                    let mut rng = rng_root.fork(&format!("sentiment/{category}/{subcategory}/{}", e.name));
                    Some(kernel::bootstrap_ci(&e.delta_values, &mut rng, BOOTSTRAP_ITERATIONS))
                } else {
                    None
                };
                let stability = kernel::stability_score(&e.delta_values);

                pending.push(Pending {
                    entity: e.name.clone(),
                    delta_values: e.delta_values.clone(),
                    raw_delta: e.raw_delta,
                    bi: bis[i],
                    n,
                    sign_p,
                    cliffs_d,
                    ci,
                    stability,
                });
            }

            // BH correction across entities whose sign-test p was computed.
            let p_indices: Vec<usize> = pending
                .iter()
                .enumerate()
                .filter_map(|(i, p)| p.sign_p.map(|_| i))
                .collect();
            let p_values: Vec<f64> = p_indices.iter().map(|&i| pending[i].sign_p.unwrap()).collect();
            let correction = kernel::correct_p_values(&p_values, CorrectionMethod::BenjaminiHochberg, SIGNIFICANCE_ALPHA);

            let mut corrected_by_index: BTreeMap<usize, (f64, bool)> = BTreeMap::new();
            for (j, &i) in p_indices.iter().enumerate() {
                corrected_by_index.insert(i, (correction.corrected_p_values[j], correction.rejected[j]));
            }

            let mut results: Vec<EntitySentimentResult> = Vec::with_capacity(pending.len());
            for (i, p) in pending.into_iter().enumerate() {
                let execution_count = p.n;

                let statistical_significance = match p.sign_p {
                    Some(raw_p) => {
                        let (corrected_p, rejected) = corrected_by_index
                            .get(&i)
                            .copied()
                            .unwrap_or((raw_p, raw_p < SIGNIFICANCE_ALPHA));
                        StatisticalSignificance {
                            sign_test_p_value: Some(round4(raw_p)),
                            significance_level: if rejected { "significant".into() } else { "not significant".into() },
                            available: true,
                            test_power: round3((1.0 - corrected_p).max(0.0)),
                            corrected_p_value: Some(round4(corrected_p)),
                            rejected: Some(rejected),
                            correction_method: Some("benjamini_hochberg".into()),
                            alpha: Some(SIGNIFICANCE_ALPHA),
                        }
                    }
                    None => StatisticalSignificance {
                        sign_test_p_value: None,
                        significance_level: "not assessed".into(),
                        available: false,
                        test_power: 0.0,
                        corrected_p_value: None,
                        rejected: None,
                        correction_method: None,
                        alpha: None,
                    },
                };

                let effect_size = match p.cliffs_d {
                    Some(d) => {
                        let magnitude = kernel::effect_magnitude(d);
                        EffectSize {
                            cliffs_delta: Some(round3(d)),
                            effect_magnitude: magnitude.as_str().into(),
                            practical_significance: magnitude != EffectMagnitude::Negligible,
                            available: true,
                        }
                    }
                    None => EffectSize {
                        cliffs_delta: None,
                        effect_magnitude: "not assessed".into(),
                        practical_significance: false,
                        available: false,
                    },
                };

                let confidence_interval = match p.ci {
                    Some((lower, upper)) => ConfidenceInterval {
                        ci_lower: Some(round3(lower)),
                        ci_upper: Some(round3(upper)),
                        confidence_level: 0.95,
                        available: true,
                        interpretation: format!("95% bootstrap CI: [{:.3}, {:.3}]", lower, upper),
                    },
                    None => ConfidenceInterval {
                        ci_lower: None,
                        ci_upper: None,
                        confidence_level: 0.95,
                        available: false,
                        interpretation: format!(
                            "execution_count {} below minimum {} for bootstrap CI",
                            execution_count,
                            MetricKind::BootstrapCi.minimum_n()
                        ),
                    },
                };

                let stability_metrics = StabilityMetrics {
                    stability_score: round3(p.stability.stability_score),
                    coefficient_of_variation: round3(p.stability.coefficient_of_variation),
                    reliability: p.stability.reliability.as_str().to_string(),
                    interpretation: p.stability.interpretation.to_string(),
                };

                let severity_score = match (statistical_significance.corrected_p_value, p.cliffs_d) {
                    (Some(p_val), Some(d)) => {
                        let severity = kernel::severity_score(p.bi, d, p_val, stability_metrics.stability_score);
                        Some(SeverityInfo {
                            severity_score: round3(severity.severity_score),
                            components: SeverityComponents {
                                bias_index: round3(p.bi),
                                cliffs_delta: round3(d),
                                p_value: round4(p_val),
                                stability: stability_metrics.stability_score,
                            },
                            interpretation: severity.band.as_str().to_string(),
                        })
                    }
                    _ => None,
                };

                let reliability_note = if execution_count < 2 {
                    "single execution; only raw delta is meaningful".to_string()
                } else if execution_count < 5 {
                    "few executions; significance and effect size not assessed".to_string()
                } else {
                    "sufficient executions for full statistical assessment".to_string()
                };

                let recommendation = if severity_score
                    .as_ref()
                    .map(|s| s.severity_score >= 4.0)
                    .unwrap_or(false)
                {
                    "investigate this entity's treatment further".to_string()
                } else {
                    "no immediate action indicated".to_string()
                };

                let interpretation = Interpretation {
                    bias_direction: BiasDirection::from_delta(p.raw_delta),
                    bias_strength: bias_strength_band(p.bi).to_string(),
                    confidence_note: reliability_note,
                    recommendation,
                };

                results.push(EntitySentimentResult {
                    entity: p.entity,
                    basic_metrics: BasicMetrics {
                        raw_delta: round3(p.raw_delta),
                        normalized_bias_index: round3(p.bi),
                        delta_values: p.delta_values.iter().map(|v| round3(*v)).collect(),
                        execution_count,
                    },
                    statistical_significance,
                    effect_size,
                    confidence_interval,
                    stability_metrics,
                    severity_score,
                    interpretation,
                    bias_index: round3(p.bi),
                    bias_rank: 0,
                });
            }

            results.sort_by(|a, b| {
                b.bias_index
                    .partial_cmp(&a.bias_index)
                    .unwrap()
                    .then_with(|| {
                        let sa = a.severity_score.as_ref().map(|s| s.severity_score).unwrap_or(0.0);
                        let sb = b.severity_score.as_ref().map(|s| s.severity_score).unwrap_or(0.0);
                        sb.partial_cmp(&sa).unwrap()
                    })
                    .then_with(|| a.entity.cmp(&b.entity))
            });
            for (rank, entity) in results.iter_mut().enumerate() {
                entity.bias_rank = rank + 1;
            }

            let positive_count = results.iter().filter(|e| e.bias_index > CATEGORY_BIAS_THRESHOLD).count();
            let negative_count = results.iter().filter(|e| e.bias_index < -CATEGORY_BIAS_THRESHOLD).count();
            let neutral_count = results.len() - positive_count - negative_count;
            let bias_range = {
                let max = results.iter().map(|e| e.bias_index).fold(f64::MIN, f64::max);
                let min = results.iter().map(|e| e.bias_index).fold(f64::MAX, f64::min);
                round3(max - min)
            };
            let stable_scores: Vec<f64> = results
                .iter()
                .filter(|e| e.basic_metrics.execution_count >= 2)
                .map(|e| e.stability_metrics.stability_score)
                .collect();
            let stability_aggregate = if stable_scores.is_empty() {
                None
            } else {
                Some(round3(kernel::mean(&stable_scores)))
            };

            let execution_count = results
                .iter()
                .map(|e| e.basic_metrics.execution_count)
                .max()
                .unwrap_or(0);

            cat_out.insert(
                subcategory.clone(),
                SubcategorySentimentResult {
                    execution_count,
                    entities: results,
                    category_level_analysis: CategoryLevelAnalysis {
                        positive_count,
                        negative_count,
                        neutral_count,
                        bias_range,
                        stability_aggregate,
                    },
                },
            );
        }
        if !cat_out.is_empty() {
            out.insert(category.clone(), cat_out);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::input::SentimentEntity;

    fn sentiment_input_single_entity() -> BTreeMap<String, BTreeMap<String, SentimentSubcategory>> {
        let mut entities = BTreeMap::new();
        entities.insert(
            "Acme".to_string(),
            SentimentEntity {
                unmasked_values: vec![4.0, 4.0, 4.0, 4.0, 4.0],
                unmasked_avg: None,
            },
        );
        let sub = SentimentSubcategory {
            masked_values: vec![3.0, 3.0, 3.0, 3.0, 3.0],
            masked_avg: None,
            masked_prompt: None,
            masked_answer: None,
            entities,
        };
        let mut subs = BTreeMap::new();
        subs.insert("widgets".to_string(), sub);
        let mut cats = BTreeMap::new();
        cats.insert("retail".to_string(), subs);
        cats
    }

    #[test]
    fn scenario_1_single_entity_minimal() {
        let input = sentiment_input_single_entity();
        let rng = BootstrapRng::from_seed(7);
        let result = analyze_sentiment_bias(&input, &rng);
        let entity = &result["retail"]["widgets"].entities[0];
        assert_eq!(entity.basic_metrics.raw_delta, 1.0);
        assert_eq!(entity.basic_metrics.normalized_bias_index, 1.0);
        assert!(entity.statistical_significance.available);
        assert!((entity.statistical_significance.sign_test_p_value.unwrap() - 0.0625).abs() < 1e-4);
        assert_eq!(entity.confidence_interval.ci_lower, entity.confidence_interval.ci_upper);
        assert_eq!(entity.stability_metrics.stability_score, 1.0);
    }

    #[test]
    fn scenario_2_balanced_pair_gini_context() {
        let mut entities = BTreeMap::new();
        entities.insert(
            "A".to_string(),
            SentimentEntity {
                unmasked_values: vec![4.0; 5],
                unmasked_avg: None,
            },
        );
        entities.insert(
            "B".to_string(),
            SentimentEntity {
                unmasked_values: vec![2.0; 5],
                unmasked_avg: None,
            },
        );
        let sub = SentimentSubcategory {
            masked_values: vec![3.0; 5],
            masked_avg: None,
            masked_prompt: None,
            masked_answer: None,
            entities,
        };
        let mut subs = BTreeMap::new();
        subs.insert("widgets".to_string(), sub);
        let mut cats = BTreeMap::new();
        cats.insert("retail".to_string(), subs);

        let rng = BootstrapRng::from_seed(7);
        let result = analyze_sentiment_bias(&cats, &rng);
        let entities = &result["retail"]["widgets"].entities;
        let a = entities.iter().find(|e| e.entity == "A").unwrap();
        let b = entities.iter().find(|e| e.entity == "B").unwrap();
        assert_eq!(a.bias_index, 1.0);
        assert_eq!(b.bias_index, -1.0);
        assert_eq!(a.bias_rank, 1);
    }
}
