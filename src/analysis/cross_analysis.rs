//! Cross-Analysis Synthesizer (C8): sentiment-ranking correlation,
//! consistent leaders/laggards, overall bias pattern, platform alignment
//! (§4.8). Reads C4, C5, C6 outputs plus the market reference (for the
//! enterprise→tier map it shares with C7, per SPEC_FULL.md §C).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::citations::CitationsComparison;
use crate::analysis::market_structure::EnterpriseTier;
use crate::analysis::ranking_bias::RankingBiasAnalysis;
use crate::analysis::sentiment::SentimentBiasAnalysis;
use crate::model::market::MarketReference;
use crate::model::output::SimilarityLevel;
use crate::rounding::round3;
use crate::stats::kernel;

const LEADER_BI_THRESHOLD: f64 = 0.5;
const LEADER_STABILITY_THRESHOLD: f64 = 0.8;
const LEADER_RANK_PERCENTILE: f64 = 0.2;
const LARGE_VS_SMALL_STRONG_GAP: f64 = 0.6;
const LARGE_VS_SMALL_MODERATE_GAP: f64 = 0.4;
const DOMINANCE_SHARE_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Serialize)]
pub struct SentimentRankingCorrelation {
    pub r: f64,
    pub p_value: Option<f64>,
    pub spearman_rho: f64,
    pub n: usize,
    pub interpretation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsistentEntity {
    pub entity: String,
    pub category: String,
    pub subcategory: String,
    pub bias_index: f64,
    pub avg_rank: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformAlignment {
    pub score: f64,
    pub level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcategoryCrossAnalysis {
    pub sentiment_ranking_correlation: Option<SentimentRankingCorrelation>,
    pub platform_alignment: Option<PlatformAlignment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrossPlatformConsistency {
    pub score: f64,
    pub reliability: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCrossAnalysis {
    pub subcategories: BTreeMap<String, SubcategoryCrossAnalysis>,
    pub overall_bias_pattern: String,
    pub cross_platform_consistency: CrossPlatformConsistency,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrossAnalysisInsights {
    pub categories: BTreeMap<String, CategoryCrossAnalysis>,
    pub consistent_leaders: Vec<ConsistentEntity>,
    pub consistent_laggards: Vec<ConsistentEntity>,
}

fn correlation_band(r: f64) -> &'static str {
    let abs = r.abs();
    if abs >= 0.7 {
        "strong"
    } else if abs >= 0.3 {
        "moderate"
    } else {
        "weak"
    }
}

pub fn analyze_cross_analysis(
    sentiment: &SentimentBiasAnalysis,
    ranking: &RankingBiasAnalysis,
    citations: &CitationsComparison,
    market: &MarketReference,
) -> CrossAnalysisInsights {
    let mut categories = BTreeMap::new();
    let mut consistent_leaders = Vec::new();
    let mut consistent_laggards = Vec::new();

    for (category, sentiment_subs) in sentiment {
        let mut subcategories = BTreeMap::new();

        let mut significant_entities = Vec::new();
        let mut tiered_bis: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();

        for (subcategory, sentiment_sub) in sentiment_subs {
            let ranking_sub = ranking.get(category).and_then(|s| s.get(subcategory));
            let citation_sub = citations.get(category).and_then(|s| s.get(subcategory));

            // Sentiment-ranking correlation + leader/laggard detection.
            let sentiment_ranking_correlation = ranking_sub.and_then(|r| {
                let mut bis = Vec::new();
                let mut ranks = Vec::new();
                for entity in &sentiment_sub.entities {
                    if let Some(rank_entry) = r.entities.get(&entity.entity) {
                        bis.push(entity.bias_index);
                        ranks.push(rank_entry.avg_rank);
                    }
                }
                if bis.len() < 2 {
                    return None;
                }
                let pearson = kernel::pearson(&bis, &ranks);
                let spearman = kernel::spearman(&bis, &ranks);
                Some(SentimentRankingCorrelation {
                    r: round3(pearson.coefficient),
                    p_value: pearson.p_value.map(round3),
                    spearman_rho: round3(spearman.coefficient),
                    n: bis.len(),
                    interpretation: correlation_band(pearson.coefficient).to_string(),
                })
            });

            if let Some(r) = ranking_sub {
                let n_entities = r.entities.len();
                let top_cut = ((n_entities as f64) * LEADER_RANK_PERCENTILE).ceil().max(1.0) as usize;
                let mut ranks_sorted: Vec<f64> = r.entities.values().map(|e| e.avg_rank).collect();
                ranks_sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let top_threshold = ranks_sorted.get(top_cut.saturating_sub(1)).copied().unwrap_or(f64::MAX);
                let bottom_threshold = ranks_sorted
                    .get(ranks_sorted.len().saturating_sub(top_cut))
                    .copied()
                    .unwrap_or(f64::MIN);

                for entity in &sentiment_sub.entities {
                    let Some(rank_entry) = r.entities.get(&entity.entity) else {
                        continue;
                    };
                    let bh_significant = entity.statistical_significance.rejected.unwrap_or(false);
                    if bh_significant {
                        significant_entities.push((entity.entity.clone(), entity.bias_index));
                    }
                    let stable_enough = entity.stability_metrics.stability_score >= LEADER_STABILITY_THRESHOLD;
                    if bh_significant && entity.bias_index.abs() > LEADER_BI_THRESHOLD && stable_enough {
                        if entity.bias_index > 0.0 && rank_entry.avg_rank <= top_threshold {
                            consistent_leaders.push(ConsistentEntity {
                                entity: entity.entity.clone(),
                                category: category.clone(),
                                subcategory: subcategory.clone(),
                                bias_index: entity.bias_index,
                                avg_rank: rank_entry.avg_rank,
                            });
                        } else if entity.bias_index < 0.0 && rank_entry.avg_rank >= bottom_threshold {
                            consistent_laggards.push(ConsistentEntity {
                                entity: entity.entity.clone(),
                                category: category.clone(),
                                subcategory: subcategory.clone(),
                                bias_index: entity.bias_index,
                                avg_rank: rank_entry.avg_rank,
                            });
                        }
                    }
                }
            }

            let platform_alignment = citation_sub.map(|c| {
                let score = c.ranking_similarity.metrics_validation.compound_similarity_score;
                PlatformAlignment {
                    score: round3(score),
                    level: match SimilarityLevel::from_score(score) {
                        SimilarityLevel::High => "high",
                        SimilarityLevel::Moderate => "moderate",
                        SimilarityLevel::Low => "low",
                    }
                    .to_string(),
                }
            });

            // Collect entities into the shared enterprise→tier map for the
            // category-level pattern classifier, below.
            for entity in &sentiment_sub.entities {
                if let Some(enterprise) = market.enterprise_of(category, &entity.entity) {
                    if let Some(cap) = market.market_cap_of(category, enterprise) {
                        tiered_bis
                            .entry(EnterpriseTier::from_market_cap(cap).as_str())
                            .or_default()
                            .push(entity.bias_index);
                    }
                }
            }

            subcategories.insert(
                subcategory.clone(),
                SubcategoryCrossAnalysis {
                    sentiment_ranking_correlation,
                    platform_alignment,
                },
            );
        }

        let overall_bias_pattern = classify_overall_pattern(&significant_entities, &tiered_bis);

        let correlation_strengths: Vec<f64> = subcategories
            .values()
            .filter_map(|s| s.sentiment_ranking_correlation.as_ref().map(|c| c.r.abs()))
            .collect();
        let alignment_scores: Vec<f64> = subcategories
            .values()
            .filter_map(|s| s.platform_alignment.as_ref().map(|a| a.score))
            .collect();
        let mut parts = Vec::new();
        parts.extend(correlation_strengths.iter().copied());
        parts.extend(alignment_scores.iter().copied());
        let consistency_score = kernel::mean(&parts);
        let n_samples = correlation_strengths.len() + alignment_scores.len();
        let reliability = if n_samples >= 5 {
            "high"
        } else if n_samples >= 2 {
            "medium"
        } else {
            "low"
        };

        categories.insert(
            category.clone(),
            CategoryCrossAnalysis {
                subcategories,
                overall_bias_pattern,
                cross_platform_consistency: CrossPlatformConsistency {
                    score: round3(consistency_score),
                    reliability: reliability.to_string(),
                },
            },
        );
    }

    CrossAnalysisInsights {
        categories,
        consistent_leaders,
        consistent_laggards,
    }
}

fn classify_overall_pattern(
    significant_entities: &[(String, f64)],
    tiered_bis: &BTreeMap<&'static str, Vec<f64>>,
) -> String {
    if significant_entities.is_empty() {
        return "balanced".to_string();
    }

    let large_bis: Vec<f64> = tiered_bis
        .get("mega_enterprise")
        .into_iter()
        .flatten()
        .chain(tiered_bis.get("large_enterprise").into_iter().flatten())
        .copied()
        .collect();
    let small_bis: Vec<f64> = tiered_bis.get("mid_enterprise").into_iter().flatten().copied().collect();

    if large_bis.is_empty() && small_bis.is_empty() {
        return "mixed_pattern".to_string();
    }

    let total = large_bis.len() + small_bis.len();
    if total > 0 {
        let large_share = large_bis.len() as f64 / total as f64;
        if large_share >= DOMINANCE_SHARE_THRESHOLD {
            return "large_enterprise_dominance".to_string();
        }
        if (1.0 - large_share) >= DOMINANCE_SHARE_THRESHOLD {
            return "small_enterprise_dominance".to_string();
        }
    }

    let large_avg = kernel::mean(&large_bis);
    let small_avg = kernel::mean(&small_bis);
    let large_pos_ratio = positive_ratio(&large_bis);
    let small_pos_ratio = positive_ratio(&small_bis);
    let gap = large_avg - small_avg;

    if gap > LARGE_VS_SMALL_STRONG_GAP || (large_pos_ratio > small_pos_ratio + 0.4 && large_pos_ratio > 0.7) {
        "strong_large_enterprise_favoritism".to_string()
    } else if gap > LARGE_VS_SMALL_MODERATE_GAP {
        "moderate_large_enterprise_favoritism".to_string()
    } else if gap < -LARGE_VS_SMALL_STRONG_GAP || (small_pos_ratio > large_pos_ratio + 0.4 && small_pos_ratio > 0.7) {
        "strong_small_enterprise_favoritism".to_string()
    } else if gap < -LARGE_VS_SMALL_MODERATE_GAP {
        "moderate_small_enterprise_favoritism".to_string()
    } else {
        "mixed_pattern".to_string()
    }
}

fn positive_ratio(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| **v > 0.0).count() as f64 / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_when_no_significant_entities() {
        let pattern = classify_overall_pattern(&[], &BTreeMap::new());
        assert_eq!(pattern, "balanced");
    }
}
