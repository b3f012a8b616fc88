//! Ranking Bias Analyzer (C5): per-entity rank statistics across runs,
//! category-level quality/stability (§4.5).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::input::RankingSubcategory;
use crate::rounding::round3;
use crate::stats::kernel::{self, CorrectionMethod};
use crate::stats::BootstrapRng;

const STABILITY_DIVISOR: f64 = 3.0;

#[derive(Debug, Clone, Serialize)]
pub struct EntityStability {
    pub mean_rank: f64,
    pub rank_std: f64,
    pub rank_range: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StabilityAnalysis {
    pub overall_stability: f64,
    pub avg_rank_std: f64,
    pub execution_count: usize,
    pub rank_variance: BTreeMap<String, EntityStability>,
    pub stability_interpretation: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityMetrics {
    pub completeness_score: f64,
    pub consistency_score: f64,
    pub entity_coverage: f64,
    pub ranking_length: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityQuality {
    pub rank_consistency: f64,
    pub has_official_url: bool,
    pub avg_rank: f64,
    pub rank_stability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityAnalysis {
    pub quality_metrics: QualityMetrics,
    pub entity_quality: BTreeMap<String, EntityQuality>,
    pub overall_quality_score: f64,
    pub quality_interpretation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetitionAnalysis {
    pub balance: String,
    pub spread: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryLevelAnalysis {
    pub rank_distribution: BTreeMap<String, Vec<String>>,
    pub competition_analysis: CompetitionAnalysis,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub execution_count: usize,
    pub avg_ranking: Vec<String>,
    pub stability_analysis: StabilityAnalysis,
    pub quality_analysis: QualityAnalysis,
    pub category_level_analysis: CategoryLevelAnalysis,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingSignificance {
    pub p_value: f64,
    pub corrected_p_value: f64,
    pub rejected: bool,
    pub compared_against: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityRankingEntry {
    pub all_ranks: Vec<u32>,
    pub avg_rank: f64,
    pub official_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking_significance: Option<RankingSignificance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcategoryRankingResult {
    pub category_summary: CategorySummary,
    pub ranking_variation: BTreeMap<String, EntityStability>,
    pub ranking_comparison: BTreeMap<String, f64>,
    pub entities: BTreeMap<String, EntityRankingEntry>,
}

pub type RankingBiasAnalysis = BTreeMap<String, BTreeMap<String, SubcategoryRankingResult>>;

fn stability_band(score: f64) -> &'static str {
    if score >= 0.9 {
        "very stable"
    } else if score >= 0.8 {
        "stable"
    } else if score >= 0.7 {
        "somewhat stable"
    } else {
        "unstable"
    }
}

fn quality_band(score: f64) -> &'static str {
    if score >= 0.8 {
        "good"
    } else if score >= 0.6 {
        "fair"
    } else {
        "poor"
    }
}

pub fn analyze_ranking_bias(
    input: &BTreeMap<String, BTreeMap<String, RankingSubcategory>>,
    _rng_root: &BootstrapRng,
) -> RankingBiasAnalysis {
    let mut out: RankingBiasAnalysis = BTreeMap::new();

    for (category, subcats) in input {
        let mut cat_out = BTreeMap::new();
        for (subcategory, sub) in subcats {
            let summary = &sub.ranking_summary;
            if summary.entities.is_empty() {
                continue;
            }

            let execution_count = summary
                .entities
                .values()
                .map(|e| e.all_ranks.len())
                .max()
                .unwrap_or(0);

            let mut rank_variance = BTreeMap::new();
            let mut std_values = Vec::new();
            for (name, entity) in &summary.entities {
                if entity.all_ranks.is_empty() {
                    continue;
                }
                let ranks: Vec<f64> = entity.all_ranks.iter().map(|r| *r as f64).collect();
                let mean_rank = kernel::mean(&ranks);
                let std = kernel::population_std(&ranks);
                let range = ranks.iter().cloned().fold(f64::MIN, f64::max)
                    - ranks.iter().cloned().fold(f64::MAX, f64::min);
                std_values.push(std);
                rank_variance.insert(
                    name.clone(),
                    EntityStability {
                        mean_rank: round3(mean_rank),
                        rank_std: round3(std),
                        rank_range: round3(range),
                    },
                );
            }

            let avg_std = kernel::mean(&std_values);
            let overall_stability = (1.0 - avg_std / STABILITY_DIVISOR).max(0.0);

            let stability_analysis = StabilityAnalysis {
                overall_stability: round3(overall_stability),
                avg_rank_std: round3(avg_std),
                execution_count,
                rank_variance: rank_variance.clone(),
                stability_interpretation: stability_band(overall_stability).to_string(),
                available: execution_count >= 2,
            };

            let consistency_scores: BTreeMap<String, f64> = rank_variance
                .iter()
                .map(|(name, stats)| (name.clone(), (1.0 - stats.rank_std / STABILITY_DIVISOR).max(0.0)))
                .collect();
            let consistency_score = kernel::mean(&consistency_scores.values().copied().collect::<Vec<_>>());
            let completeness_score = if summary.entities.is_empty() {
                0.0
            } else {
                summary.avg_ranking.len() as f64 / summary.entities.len() as f64
            };
            let entity_coverage = if summary.entities.is_empty() {
                0.0
            } else {
                summary
                    .entities
                    .values()
                    .filter(|e| e.all_ranks.len() == execution_count && execution_count > 0)
                    .count() as f64
                    / summary.entities.len() as f64
            };

            let entity_quality: BTreeMap<String, EntityQuality> = summary
                .entities
                .iter()
                .map(|(name, entity)| {
                    let ranks: Vec<f64> = entity.all_ranks.iter().map(|r| *r as f64).collect();
                    let rank_stability = kernel::stability_score(&ranks).stability_score;
                    (
                        name.clone(),
                        EntityQuality {
                            rank_consistency: round3(*consistency_scores.get(name).unwrap_or(&0.0)),
                            has_official_url: entity.official_url.is_some(),
                            avg_rank: round3(entity.avg_rank),
                            rank_stability: round3(rank_stability),
                        },
                    )
                })
                .collect();

            let overall_quality_score = (completeness_score + consistency_score) / 2.0;
            let quality_analysis = QualityAnalysis {
                quality_metrics: QualityMetrics {
                    completeness_score: round3(completeness_score),
                    consistency_score: round3(consistency_score),
                    entity_coverage: round3(entity_coverage),
                    ranking_length: summary.avg_ranking.len(),
                },
                entity_quality,
                overall_quality_score: round3(overall_quality_score),
                quality_interpretation: quality_band(overall_quality_score).to_string(),
            };

            let n_entities = summary.entities.len();
            let third = (n_entities as f64 / 3.0).ceil() as usize;
            let mut rank_distribution: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (i, name) in summary.avg_ranking.iter().enumerate() {
                let tier = if i < third {
                    "上位"
                } else if i < n_entities.saturating_sub(third) {
                    "中位"
                } else {
                    "下位"
                };
                rank_distribution.entry(tier.to_string()).or_default().push(name.clone());
            }
            let balance = if n_entities >= 5 {
                "high"
            } else if n_entities >= 3 {
                "mid"
            } else {
                "low"
            };
            let spread = if summary.avg_ranking.len() == n_entities {
                "full"
            } else {
                "partial"
            };
            let category_level_analysis = CategoryLevelAnalysis {
                rank_distribution,
                competition_analysis: CompetitionAnalysis {
                    balance: balance.to_string(),
                    spread: spread.to_string(),
                },
            };

            let mut ranking_comparison = BTreeMap::new();
            let order = &summary.avg_ranking;
            for i in 0..order.len() {
                for j in (i + 1)..order.len() {
                    let (e1, e2) = (&order[i], &order[j]);
                    let (Some(r1), Some(r2)) = (summary.entities.get(e1), summary.entities.get(e2)) else {
                        continue;
                    };
                    if r1.all_ranks.len() != r2.all_ranks.len() || r1.all_ranks.is_empty() {
                        continue;
                    }
                    let diffs: Vec<f64> = r1
                        .all_ranks
                        .iter()
                        .zip(&r2.all_ranks)
                        .map(|(a, b)| *a as f64 - *b as f64)
                        .collect();
                    ranking_comparison.insert(format!("{e1}_vs_{e2}"), round3(kernel::mean(&diffs)));
                }
            }

            // Adjacent-pair sign test along avg_ranking order, BH-corrected,
            // attached to the earlier-ranked entity under `ranking_significance`.
            struct AdjPair {
                entity: String,
                compared_against: String,
                p: f64,
            }
            let mut adj_pairs = Vec::new();
            for w in order.windows(2) {
                let (e1, e2) = (&w[0], &w[1]);
                let (Some(r1), Some(r2)) = (summary.entities.get(e1), summary.entities.get(e2)) else {
                    continue;
                };
                if r1.all_ranks.len() != r2.all_ranks.len() || r1.all_ranks.len() < 5 {
                    continue;
                }
                let ranks1: Vec<f64> = r1.all_ranks.iter().map(|r| *r as f64).collect();
                let ranks2: Vec<f64> = r2.all_ranks.iter().map(|r| *r as f64).collect();
                let p = kernel::sign_test_p_value(&ranks1, &ranks2);
                adj_pairs.push(AdjPair {
                    entity: e1.clone(),
                    compared_against: e2.clone(),
                    p,
                });
            }
            let p_values: Vec<f64> = adj_pairs.iter().map(|a| a.p).collect();
            let correction = kernel::correct_p_values(&p_values, CorrectionMethod::BenjaminiHochberg, 0.05);

            let mut significance_by_entity: BTreeMap<String, RankingSignificance> = BTreeMap::new();
            for (i, pair) in adj_pairs.iter().enumerate() {
                significance_by_entity.insert(
                    pair.entity.clone(),
                    RankingSignificance {
                        p_value: pair.p,
                        corrected_p_value: correction.corrected_p_values[i],
                        rejected: correction.rejected[i],
                        compared_against: pair.compared_against.clone(),
                    },
                );
            }

            let entities: BTreeMap<String, EntityRankingEntry> = summary
                .entities
                .iter()
                .map(|(name, entity)| {
                    (
                        name.clone(),
                        EntityRankingEntry {
                            all_ranks: entity.all_ranks.clone(),
                            avg_rank: entity.avg_rank,
                            official_url: entity.official_url.clone(),
                            ranking_significance: significance_by_entity.get(name).cloned(),
                        },
                    )
                })
                .collect();

            cat_out.insert(
                subcategory.clone(),
                SubcategoryRankingResult {
                    category_summary: CategorySummary {
                        execution_count,
                        avg_ranking: summary.avg_ranking.clone(),
                        stability_analysis,
                        quality_analysis,
                        category_level_analysis,
                    },
                    ranking_variation: rank_variance,
                    ranking_comparison,
                    entities,
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
    use crate::model::input::RankingEntity;

    fn ranking_input_scenario_3() -> BTreeMap<String, BTreeMap<String, RankingSubcategory>> {
        let mut entities = BTreeMap::new();
        entities.insert(
            "A".to_string(),
            RankingEntity {
                all_ranks: vec![1; 10],
                avg_rank: 1.0,
                official_url: Some("https://a.example".into()),
            },
        );
        entities.insert(
            "B".to_string(),
            RankingEntity {
                all_ranks: vec![2; 10],
                avg_rank: 2.0,
                official_url: None,
            },
        );
        entities.insert(
            "C".to_string(),
            RankingEntity {
                all_ranks: vec![3; 10],
                avg_rank: 3.0,
                official_url: None,
            },
        );
        let summary = crate::model::input::RankingSummary {
            entities,
            avg_ranking: vec!["A".into(), "B".into(), "C".into()],
        };
        let sub = RankingSubcategory { ranking_summary: summary };
        let mut subs = BTreeMap::new();
        subs.insert("widgets".to_string(), sub);
        let mut cats = BTreeMap::new();
        cats.insert("retail".to_string(), subs);
        cats
    }

    #[test]
    fn scenario_3_ranking_stability_is_perfect() {
        let input = ranking_input_scenario_3();
        let rng = BootstrapRng::from_seed(1);
        let result = analyze_ranking_bias(&input, &rng);
        let sub = &result["retail"]["widgets"];
        assert_eq!(sub.category_summary.stability_analysis.overall_stability, 1.0);
        assert!(sub.category_summary.quality_analysis.overall_quality_score >= 0.99);
    }
}
