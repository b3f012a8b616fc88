//! Citations-vs-Search Comparator (C6): domain-ranking similarity,
//! official-domain bias δ, sentiment-distribution comparison (§4.6).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::input::{DomainEntity, DomainSubcategory, ResultSentiment};
use crate::ranking::utils::{self, RankingMetrics};
use crate::rounding::round3;

const DOMAIN_TRUNCATE: usize = 20;
const OFFICIAL_BIAS_NEUTRAL_BAND: f64 = 0.1;
const TAU_WEIGHT: f64 = 0.4;
const RBO_WEIGHT: f64 = 0.4;
const OVERLAP_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Serialize)]
pub struct MetricsValidation {
    pub reconciliation: String,
    pub compound_similarity_score: f64,
    pub similarity_level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingSimilarity {
    pub rbo_score: f64,
    pub kendall_tau: f64,
    pub overlap_ratio: f64,
    pub delta_ranks_available: bool,
    pub metrics_validation: MetricsValidation,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfficialDomainAnalysis {
    pub google_official_ratio: f64,
    pub citations_official_ratio: f64,
    pub official_bias_delta: f64,
    pub bias_direction: String,
    pub google_counts: (usize, usize),
    pub citations_counts: (usize, usize),
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentComparison {
    pub google_sentiment_distribution: SentimentDistribution,
    pub citations_sentiment_distribution: SentimentDistribution,
    pub sentiment_correlation: f64,
    pub positive_bias_delta: f64,
    pub google_sample_size: usize,
    pub citations_sample_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcategoryCitationResult {
    pub ranking_similarity: RankingSimilarity,
    pub official_domain_analysis: OfficialDomainAnalysis,
    pub sentiment_comparison: SentimentComparison,
    pub google_domains_count: usize,
    pub citations_domains_count: usize,
    pub data_quality: String,
}

pub type CitationsComparison = BTreeMap<String, BTreeMap<String, SubcategoryCitationResult>>;

fn extract_domains(entities: &BTreeMap<String, DomainEntity>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for entity in entities.values() {
        for item in entity.official_results.iter().chain(&entity.reputation_results) {
            if seen.insert(item.domain.clone()) {
                out.push(item.domain.clone());
                if out.len() >= DOMAIN_TRUNCATE {
                    return out;
                }
            }
        }
    }
    out
}

fn official_counts(entities: &BTreeMap<String, DomainEntity>) -> (usize, usize) {
    let official: usize = entities.values().map(|e| e.official_results.len()).sum();
    let reputation: usize = entities.values().map(|e| e.reputation_results.len()).sum();
    (official, reputation)
}

fn sentiment_distribution(entities: &BTreeMap<String, DomainEntity>) -> SentimentDistribution {
    let mut dist = SentimentDistribution::default();
    for entity in entities.values() {
        for item in &entity.reputation_results {
            match item.sentiment {
                Some(ResultSentiment::Positive) => dist.positive += 1,
                Some(ResultSentiment::Negative) => dist.negative += 1,
                Some(ResultSentiment::Neutral) => dist.neutral += 1,
                Some(ResultSentiment::Unknown) | None => dist.unknown += 1,
            }
        }
    }
    dist
}

fn sample_size(dist: &SentimentDistribution) -> usize {
    dist.positive + dist.negative + dist.neutral + dist.unknown
}

fn positive_ratio(dist: &SentimentDistribution) -> f64 {
    let n = sample_size(dist);
    if n == 0 {
        0.0
    } else {
        dist.positive as f64 / n as f64
    }
}

fn similarity_score(metrics: &RankingMetrics) -> f64 {
    let tau = if metrics.tau_available { metrics.kendall_tau.abs() } else { 0.0 };
    tau * TAU_WEIGHT + metrics.rbo_score * RBO_WEIGHT + metrics.overlap_ratio * OVERLAP_WEIGHT
}

pub fn analyze_citations(
    google_data: &BTreeMap<String, BTreeMap<String, DomainSubcategory>>,
    perplexity_citations: &BTreeMap<String, BTreeMap<String, DomainSubcategory>>,
) -> CitationsComparison {
    let mut out: CitationsComparison = BTreeMap::new();
    for (category, google_subs) in google_data {
        let Some(citation_subs) = perplexity_citations.get(category) else {
            continue;
        };
        let mut cat_out = BTreeMap::new();
        for (subcategory, google_sub) in google_subs {
            let Some(citation_sub) = citation_subs.get(subcategory) else {
                continue;
            };

            let google_domains = extract_domains(&google_sub.entities);
            let citation_domains = extract_domains(&citation_sub.entities);

            let ranking_metrics = utils::compute_ranking_metrics(&google_domains, &citation_domains);
            let reconciliation = utils::reconcile_similarity(&ranking_metrics);
            let compound_score = similarity_score(&ranking_metrics);
            let similarity_level = if compound_score > 0.7 {
                "high"
            } else if compound_score > 0.4 {
                "moderate"
            } else {
                "low"
            };

            let ranking_similarity = RankingSimilarity {
                rbo_score: round3(ranking_metrics.rbo_score),
                kendall_tau: round3(ranking_metrics.kendall_tau),
                overlap_ratio: round3(ranking_metrics.overlap_ratio),
                delta_ranks_available: ranking_metrics.common_count >= 2,
                metrics_validation: MetricsValidation {
                    reconciliation,
                    compound_similarity_score: round3(compound_score),
                    similarity_level: similarity_level.to_string(),
                },
            };

            let (g_official, g_reputation) = official_counts(&google_sub.entities);
            let (c_official, c_reputation) = official_counts(&citation_sub.entities);
            let google_ratio = if g_official + g_reputation == 0 {
                0.0
            } else {
                g_official as f64 / (g_official + g_reputation) as f64
            };
            let citations_ratio = if c_official + c_reputation == 0 {
                0.0
            } else {
                c_official as f64 / (c_official + c_reputation) as f64
            };
            let delta = citations_ratio - google_ratio;
            let bias_direction = if delta > OFFICIAL_BIAS_NEUTRAL_BAND {
                "citations_favors_official"
            } else if delta < -OFFICIAL_BIAS_NEUTRAL_BAND {
                "google_favors_official"
            } else {
                "neutral"
            };

            let google_dist = sentiment_distribution(&google_sub.entities);
            let citations_dist = sentiment_distribution(&citation_sub.entities);
            let google_pos_ratio = positive_ratio(&google_dist);
            let citations_pos_ratio = positive_ratio(&citations_dist);
            let sentiment_correlation = 1.0 - (google_pos_ratio - citations_pos_ratio).abs();

            let sentiment_comparison = SentimentComparison {
                google_sample_size: sample_size(&google_dist),
                citations_sample_size: sample_size(&citations_dist),
                google_sentiment_distribution: google_dist,
                citations_sentiment_distribution: citations_dist,
                sentiment_correlation: round3(sentiment_correlation),
                positive_bias_delta: round3(citations_pos_ratio - google_pos_ratio),
            };

            let data_quality = if google_domains.is_empty() || citation_domains.is_empty() {
                "insufficient"
            } else if ranking_metrics.common_count >= 3 {
                "good"
            } else {
                "limited"
            };

            cat_out.insert(
                subcategory.clone(),
                SubcategoryCitationResult {
                    ranking_similarity,
                    official_domain_analysis: OfficialDomainAnalysis {
                        google_official_ratio: round3(google_ratio),
                        citations_official_ratio: round3(citations_ratio),
                        official_bias_delta: round3(delta),
                        bias_direction: bias_direction.to_string(),
                        google_counts: (g_official, g_reputation),
                        citations_counts: (c_official, c_reputation),
                    },
                    sentiment_comparison,
                    google_domains_count: google_domains.len(),
                    citations_domains_count: citation_domains.len(),
                    data_quality: data_quality.to_string(),
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
    use crate::model::input::ResultItem;

    fn domain_entity(domains: &[&str]) -> DomainEntity {
        DomainEntity {
            official_results: domains
                .iter()
                .enumerate()
                .map(|(i, d)| ResultItem {
                    rank: i as u32 + 1,
                    domain: d.to_string(),
                    title: None,
                    snippet: None,
                    sentiment: None,
                })
                .collect(),
            reputation_results: Vec::new(),
        }
    }

    #[test]
    fn scenario_4_citation_mismatch() {
        let google_domains: Vec<&str> = vec!["g1", "g2", "g3", "g4", "g5", "g6", "g7", "g8", "g9", "g10"];
        let citation_domains: Vec<&str> = google_domains.iter().rev().copied().collect();

        let mut g_entities = BTreeMap::new();
        g_entities.insert("Acme".to_string(), domain_entity(&google_domains));
        let mut c_entities = BTreeMap::new();
        c_entities.insert("Acme".to_string(), domain_entity(&citation_domains));

        let mut google_subs = BTreeMap::new();
        google_subs.insert(
            "widgets".to_string(),
            DomainSubcategory { entities: g_entities },
        );
        let mut citation_subs = BTreeMap::new();
        citation_subs.insert(
            "widgets".to_string(),
            DomainSubcategory { entities: c_entities },
        );
        let mut google = BTreeMap::new();
        google.insert("retail".to_string(), google_subs);
        let mut citations = BTreeMap::new();
        citations.insert("retail".to_string(), citation_subs);

        let result = analyze_citations(&google, &citations);
        let sub = &result["retail"]["widgets"];
        assert_eq!(sub.ranking_similarity.overlap_ratio, 1.0);
        assert!((sub.ranking_similarity.kendall_tau - (-1.0)).abs() < 1e-6);
        assert!(sub.ranking_similarity.metrics_validation.reconciliation.contains("inverted"));
    }
}
