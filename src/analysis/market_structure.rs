//! Relative / Market-Structure Analyzer (C7): inequality, tier favoritism,
//! fair-share ratio, service/enterprise-level fairness, HHI, integrated
//! fairness (§4.7). Reads C4's entity-level bias indices plus the market
//! reference tables.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::sentiment::SentimentBiasAnalysis;
use crate::model::market::{MarketReference, ShareDataType};
use crate::rounding::round3;
use crate::stats::kernel::{self, InequalityBand};

const ENTERPRISE_MEGA_THRESHOLD: f64 = 100.0;
const ENTERPRISE_LARGE_THRESHOLD: f64 = 10.0;
const FAVORITISM_STRONG_GAP: f64 = 0.5;
const FAVORITISM_MODERATE_GAP: f64 = 0.2;
const CORRELATION_STRONG: f64 = 0.7;
const CORRELATION_MODERATE: f64 = 0.3;
const INTEGRATED_FAIR_VERY: f64 = 0.8;
const INTEGRATED_FAIR_OK: f64 = 0.6;
const INTEGRATED_FAIR_MILD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterpriseTier {
    Mega,
    Large,
    Mid,
}

impl EnterpriseTier {
    pub fn from_market_cap(cap: f64) -> Self {
        if cap >= ENTERPRISE_MEGA_THRESHOLD {
            EnterpriseTier::Mega
        } else if cap >= ENTERPRISE_LARGE_THRESHOLD {
            EnterpriseTier::Large
        } else {
            EnterpriseTier::Mid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnterpriseTier::Mega => "mega_enterprise",
            EnterpriseTier::Large => "large_enterprise",
            EnterpriseTier::Mid => "mid_enterprise",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    pub count: usize,
    pub mean_bias_index: f64,
    pub median_bias_index: f64,
    pub stdev_bias_index: f64,
    pub roster: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnterpriseLevelBias {
    pub tiers: BTreeMap<String, TierStats>,
    pub tier_gaps: BTreeMap<String, f64>,
    pub favoritism_type: String,
    pub significance: Option<WelchSignificance>,
    pub fairness_score: f64,
    pub market_cap_correlation: Option<CorrelationSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WelchSignificance {
    pub t_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationSummary {
    pub coefficient: f64,
    pub strength: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceEntry {
    pub raw_share: f64,
    pub normalized_share: f64,
    pub bias_index: Option<f64>,
    pub fair_share_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceLevelBias {
    pub data_type: String,
    pub services: BTreeMap<String, ServiceEntry>,
    pub hhi: f64,
    pub concentration_band: String,
    pub fairness_score: f64,
    pub equal_opportunity_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BiasInequality {
    pub gini: f64,
    pub std_dev: f64,
    pub range: f64,
    pub band: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketShareCorrelation {
    pub available: bool,
    pub pearson_r: Option<f64>,
    pub spearman_rho: Option<f64>,
    pub overall_fairness_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegratedFairness {
    pub score: f64,
    pub confidence: String,
    pub interpretation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcategoryMarketStructure {
    pub bias_inequality: BiasInequality,
    pub market_share_correlation: MarketShareCorrelation,
    pub enterprise_level: Option<EnterpriseLevelBias>,
    pub service_level: Option<ServiceLevelBias>,
    pub integrated_fairness: IntegratedFairness,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryMarketStructure {
    pub subcategories: BTreeMap<String, SubcategoryMarketStructure>,
    pub hhi_bias_correlation: Option<CorrelationSummary>,
}

pub type RelativeBiasAnalysis = BTreeMap<String, CategoryMarketStructure>;

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn correlation_strength(r: f64) -> &'static str {
    let abs = r.abs();
    if abs >= CORRELATION_STRONG {
        "strong"
    } else if abs >= CORRELATION_MODERATE {
        "moderate"
    } else {
        "weak"
    }
}

fn favoritism_type(gap: f64) -> &'static str {
    if gap >= FAVORITISM_STRONG_GAP {
        "large_enterprise_favoritism"
    } else if gap > FAVORITISM_MODERATE_GAP {
        "moderate_large_favoritism"
    } else if gap >= -FAVORITISM_MODERATE_GAP {
        "neutral"
    } else if gap > -FAVORITISM_STRONG_GAP {
        "moderate_small_favoritism"
    } else {
        "small_enterprise_favoritism"
    }
}

fn integrated_fairness_band(score: f64) -> &'static str {
    if score >= INTEGRATED_FAIR_VERY {
        "very fair"
    } else if score >= INTEGRATED_FAIR_OK {
        "fair"
    } else if score >= INTEGRATED_FAIR_MILD {
        "mild bias"
    } else {
        "severe"
    }
}

fn enterprise_level_analysis(
    category: &str,
    market: &MarketReference,
    entity_bis: &BTreeMap<String, f64>,
) -> Option<EnterpriseLevelBias> {
    let mut by_tier: BTreeMap<&'static str, Vec<(String, f64)>> = BTreeMap::new();
    let mut caps_and_bis = Vec::new();
    for (entity, &bi) in entity_bis {
        let Some(enterprise) = market.enterprise_of(category, entity) else {
            continue;
        };
        let Some(cap) = market.market_cap_of(category, enterprise) else {
            continue;
        };
        let tier = EnterpriseTier::from_market_cap(cap);
        by_tier.entry(tier.as_str()).or_default().push((entity.clone(), bi));
        caps_and_bis.push((cap, bi));
    }
    if by_tier.is_empty() {
        return None;
    }

    let mut tiers = BTreeMap::new();
    let mut means: BTreeMap<&str, f64> = BTreeMap::new();
    for (tier, members) in &by_tier {
        let bis: Vec<f64> = members.iter().map(|(_, bi)| *bi).collect();
        let mean = kernel::mean(&bis);
        means.insert(tier, mean);
        tiers.insert(
            tier.to_string(),
            TierStats {
                count: members.len(),
                mean_bias_index: round3(mean),
                median_bias_index: round3(median(&bis)),
                stdev_bias_index: round3(kernel::sample_std(&bis)),
                roster: members.iter().map(|(name, _)| name.clone()).collect(),
            },
        );
    }

    let mut tier_gaps = BTreeMap::new();
    let keys: Vec<&str> = means.keys().copied().collect();
    for i in 0..keys.len() {
        for j in 0..keys.len() {
            if i == j {
                continue;
            }
            let gap_name = format!("{}_vs_{}_gap", keys[i].trim_end_matches("_enterprise"), keys[j].trim_end_matches("_enterprise"));
            tier_gaps.insert(gap_name, round3(means[keys[i]] - means[keys[j]]));
        }
    }

    let large_bis: Vec<f64> = by_tier
        .get("mega_enterprise")
        .into_iter()
        .flatten()
        .chain(by_tier.get("large_enterprise").into_iter().flatten())
        .map(|(_, bi)| *bi)
        .collect();
    let mid_bis: Vec<f64> = by_tier
        .get("mid_enterprise")
        .into_iter()
        .flatten()
        .map(|(_, bi)| *bi)
        .collect();
    let gap = kernel::mean(&large_bis) - kernel::mean(&mid_bis);

    let significance = if large_bis.len() >= 2 && mid_bis.len() >= 2 {
        kernel::welch_t_test(&large_bis, &mid_bis).map(|(t, p)| WelchSignificance {
            t_statistic: round3(t),
            p_value: round3(p),
            significant: p < 0.05,
        })
    } else {
        None
    };

    let all_bis: Vec<f64> = by_tier.values().flatten().map(|(_, bi)| *bi).collect();
    let variance_fairness = (1.0 - kernel::sample_std(&all_bis).powi(2)).max(0.0);
    let gap_fairness: Vec<f64> = tier_gaps.values().map(|g| 1.0 - g.abs().min(1.0)).collect();
    let fairness_score = (kernel::mean(&gap_fairness) + variance_fairness) / 2.0;

    let caps: Vec<f64> = caps_and_bis.iter().map(|(cap, _)| *cap).collect();
    let bis_for_corr: Vec<f64> = caps_and_bis.iter().map(|(_, bi)| *bi).collect();
    let market_cap_correlation = if caps.len() >= 2 {
        let corr = kernel::pearson(&caps, &bis_for_corr);
        if corr.insufficient {
            None
        } else {
            Some(CorrelationSummary {
                coefficient: round3(corr.coefficient),
                strength: correlation_strength(corr.coefficient).to_string(),
            })
        }
    } else {
        None
    };

    Some(EnterpriseLevelBias {
        tiers,
        tier_gaps,
        favoritism_type: favoritism_type(gap).to_string(),
        significance,
        fairness_score: round3(fairness_score),
        market_cap_correlation,
    })
}

fn service_level_analysis(
    category: &str,
    market: &MarketReference,
    entity_bis: &BTreeMap<String, f64>,
) -> Option<ServiceLevelBias> {
    let services = market.services_in(category)?;
    if services.is_empty() {
        return None;
    }
    let data_type = services.values().next().map(|e| e.data_type()).unwrap_or(ShareDataType::Other);

    let raw_shares: BTreeMap<String, f64> = services
        .iter()
        .filter_map(|(name, entry)| entry.raw_share().map(|s| (name.clone(), s)))
        .collect();
    if raw_shares.is_empty() {
        return None;
    }

    let normalized: BTreeMap<String, f64> = match data_type {
        ShareDataType::Ratio => raw_shares.iter().map(|(k, v)| (k.clone(), v.clamp(0.0, 1.0))).collect(),
        _ => {
            let values: Vec<f64> = raw_shares.values().copied().collect();
            let min = values.iter().cloned().fold(f64::MAX, f64::min);
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            if (max - min).abs() < f64::EPSILON {
                raw_shares.keys().map(|k| (k.clone(), 0.5)).collect()
            } else {
                raw_shares
                    .iter()
                    .map(|(k, v)| (k.clone(), (v - min) / (max - min)))
                    .collect()
            }
        }
    };

    let mut service_entries = BTreeMap::new();
    let mut fsr_values = Vec::new();
    let mut bi_values = Vec::new();
    for (name, &raw_share) in &raw_shares {
        let norm_share = normalized.get(name).copied().unwrap_or(0.0);
        let bi = entity_bis.get(name).copied();
        let fsr = bi.map(|b| if norm_share == 0.0 { 0.0 } else { 1.0 + b });
        if let Some(f) = fsr {
            fsr_values.push(f);
        }
        if let Some(b) = bi {
            bi_values.push(b);
        }
        service_entries.insert(
            name.clone(),
            ServiceEntry {
                raw_share: round3(raw_share),
                normalized_share: round3(norm_share),
                bias_index: bi.map(round3),
                fair_share_ratio: fsr.map(round3),
            },
        );
    }

    let hhi_value = kernel::hhi(&normalized.values().copied().collect::<Vec<_>>());
    let variance_bi = kernel::sample_std(&bi_values).powi(2);
    let ratio_fairness = 1.0 - kernel::mean(&fsr_values.iter().map(|f| (f - 1.0).abs()).collect::<Vec<_>>());
    let variance_fairness = 1.0 / (1.0 + variance_bi);
    let concentration_fairness = 1.0 / (1.0 + hhi_value / 10000.0);
    let fairness_score = (ratio_fairness + variance_fairness + concentration_fairness) / 3.0;
    let equal_opportunity_score = kernel::mean(
        &fsr_values
            .iter()
            .map(|f| (1.0 - (f - 1.0).abs()).max(0.0))
            .collect::<Vec<_>>(),
    );

    Some(ServiceLevelBias {
        data_type: match data_type {
            ShareDataType::Ratio => "ratio",
            ShareDataType::Monetary => "monetary",
            ShareDataType::UserCount => "user_count",
            ShareDataType::Other => "other",
        }
        .to_string(),
        services: service_entries,
        hhi: round3(hhi_value),
        concentration_band: match kernel::concentration_band(hhi_value) {
            kernel::ConcentrationBand::Low => "low",
            kernel::ConcentrationBand::Moderate => "moderate",
            kernel::ConcentrationBand::High => "high",
        }
        .to_string(),
        fairness_score: round3(fairness_score),
        equal_opportunity_score: round3(equal_opportunity_score),
    })
}

pub fn analyze_market_structure(
    sentiment: &SentimentBiasAnalysis,
    market: &MarketReference,
) -> RelativeBiasAnalysis {
    let mut out: RelativeBiasAnalysis = BTreeMap::new();
    for (category, subcats) in sentiment {
        let mut cat_out = BTreeMap::new();
        let mut hhi_values = Vec::new();
        let mut mean_abs_bi_values = Vec::new();
        for (subcategory, sub) in subcats {
            let entity_bis: BTreeMap<String, f64> = sub
                .entities
                .iter()
                .map(|e| (e.entity.clone(), e.bias_index))
                .collect();
            let bi_values: Vec<f64> = entity_bis.values().copied().collect();

            let inequality = kernel::bias_inequality(&bi_values);
            let bias_inequality = BiasInequality {
                gini: round3(inequality.gini),
                std_dev: round3(inequality.std_dev),
                range: round3(inequality.range),
                band: match inequality.band {
                    InequalityBand::Equal => "equal",
                    InequalityBand::SomewhatUnequal => "somewhat unequal",
                    InequalityBand::Moderate => "moderate",
                    InequalityBand::Strong => "strong",
                }
                .to_string(),
            };

            let shares: Vec<f64> = market
                .services_in(category)
                .map(|services| {
                    entity_bis
                        .keys()
                        .filter_map(|name| services.get(name).and_then(|e| e.raw_share()))
                        .collect()
                })
                .unwrap_or_default();
            let matched_bis: Vec<f64> = market
                .services_in(category)
                .map(|services| {
                    entity_bis
                        .iter()
                        .filter(|(name, _)| services.contains_key(*name))
                        .map(|(_, bi)| *bi)
                        .collect()
                })
                .unwrap_or_default();

            let market_share_correlation = if shares.len() >= 2 {
                let pearson = kernel::pearson(&shares, &matched_bis);
                let spearman = kernel::spearman(&shares, &matched_bis);
                MarketShareCorrelation {
                    available: true,
                    pearson_r: Some(round3(pearson.coefficient)),
                    spearman_rho: Some(round3(spearman.coefficient)),
                    overall_fairness_score: Some(round3(1.0 - pearson.coefficient.abs())),
                }
            } else {
                MarketShareCorrelation {
                    available: false,
                    pearson_r: None,
                    spearman_rho: None,
                    overall_fairness_score: None,
                }
            };

            let enterprise_level = enterprise_level_analysis(category, market, &entity_bis);
            let service_level = service_level_analysis(category, market, &entity_bis);

            let (score, confidence) = match (&enterprise_level, &service_level) {
                (Some(e), Some(s)) => ((e.fairness_score + s.equal_opportunity_score) / 2.0, "high"),
                (Some(e), None) => (e.fairness_score, "medium"),
                (None, Some(s)) => (s.equal_opportunity_score, "medium"),
                (None, None) => (0.5, "low"),
            };
            let integrated_fairness = IntegratedFairness {
                score: round3(score),
                confidence: confidence.to_string(),
                interpretation: integrated_fairness_band(score).to_string(),
            };

            if let Some(service) = &service_level {
                if !bi_values.is_empty() {
                    hhi_values.push(service.hhi);
                    mean_abs_bi_values.push(kernel::mean(&bi_values.iter().map(|v| v.abs()).collect::<Vec<_>>()));
                }
            }

            cat_out.insert(
                subcategory.clone(),
                SubcategoryMarketStructure {
                    bias_inequality,
                    market_share_correlation,
                    enterprise_level,
                    service_level,
                    integrated_fairness,
                },
            );
        }
        if !cat_out.is_empty() {
            let hhi_bias_correlation = if hhi_values.len() >= 2 {
                let corr = kernel::pearson(&hhi_values, &mean_abs_bi_values);
                if corr.insufficient {
                    None
                } else {
                    Some(CorrelationSummary {
                        coefficient: round3(corr.coefficient),
                        strength: correlation_strength(corr.coefficient).to_string(),
                    })
                }
            } else {
                None
            };
            out.insert(
                category.clone(),
                CategoryMarketStructure {
                    subcategories: cat_out,
                    hhi_bias_correlation,
                },
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favoritism_type_bands() {
        assert_eq!(favoritism_type(0.6), "large_enterprise_favoritism");
        assert_eq!(favoritism_type(0.3), "moderate_large_favoritism");
        assert_eq!(favoritism_type(0.0), "neutral");
        assert_eq!(favoritism_type(-0.3), "moderate_small_favoritism");
        assert_eq!(favoritism_type(-0.6), "small_enterprise_favoritism");
    }

    #[test]
    fn hhi_scenario_6_via_kernel() {
        assert_eq!(kernel::hhi(&[0.8, 0.1, 0.1]), 6600.0);
    }
}
