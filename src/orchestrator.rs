//! Orchestrator (C9): loads the integrated record, drives C4-C8 in order,
//! assembles the output envelope, and persists it (§4.9).

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::citations::{self, CitationsComparison};
use crate::analysis::cross_analysis::{self, CrossAnalysisInsights};
use crate::analysis::market_structure::{self, RelativeBiasAnalysis};
use crate::analysis::ranking_bias::{self, RankingBiasAnalysis};
use crate::analysis::sentiment::{self, SentimentBiasAnalysis};
use crate::model::input::IntegratedRecord;
use crate::model::market::MarketReference;
use crate::reliability::{self, AvailabilityTable, ReliabilityTier};
use crate::stats::BootstrapRng;

pub const ANALYSIS_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub analysis_date: String,
    pub analysis_version: String,
    pub source_data: String,
    pub execution_count: usize,
    pub reliability_level: ReliabilityTier,
    pub confidence_level: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisLimitations {
    pub execution_count_warning: Option<String>,
    pub data_quality_issues: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub scope_limitations: Vec<String>,
    pub interpretation_caveats: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisEnvelope {
    pub metadata: Metadata,
    pub sentiment_bias_analysis: SentimentBiasAnalysis,
    pub ranking_bias_analysis: RankingBiasAnalysis,
    pub citations_google_comparison: CitationsComparison,
    pub relative_bias_analysis: RelativeBiasAnalysis,
    pub cross_analysis_insights: CrossAnalysisInsights,
    pub data_availability_summary: AvailabilityTable,
    pub analysis_limitations: AnalysisLimitations,
}

fn derive_execution_count(sentiment: &SentimentBiasAnalysis) -> usize {
    sentiment
        .values()
        .flat_map(|subs| subs.values())
        .map(|sub| sub.execution_count)
        .max()
        .unwrap_or(0)
}

fn build_limitations(execution_count: usize, tier: ReliabilityTier) -> AnalysisLimitations {
    let execution_count_warning = match tier {
        ReliabilityTier::ExecutionInsufficient => {
            Some(format!("execution_count={execution_count} is below the minimum for any statistical assessment"))
        }
        ReliabilityTier::ReferenceOnly | ReliabilityTier::Basic => Some(format!(
            "execution_count={execution_count} yields only low-confidence estimates; treat results as directional"
        )),
        _ => None,
    };
    AnalysisLimitations {
        execution_count_warning,
        data_quality_issues: Vec::new(),
        recommended_actions: vec![
            "increase execution_count for higher-confidence significance testing".to_string(),
        ],
        scope_limitations: vec![
            "this engine analyzes an already-collected dataset; it does not perform data collection".to_string(),
        ],
        interpretation_caveats: vec![
            "bias metrics are descriptive of observed model outputs, not causal claims about intent".to_string(),
        ],
    }
}

/// Runs the full C1 -> C4 -> C5 -> C6 -> C7 -> C8 -> envelope pipeline over
/// an already-loaded, already-validated record.
pub fn run_analysis(
    record: &IntegratedRecord,
    market: &MarketReference,
    rng_seed: u64,
    analysis_date: &str,
    source_data: &str,
) -> Result<AnalysisEnvelope> {
    let Some(sentiment_input) = &record.perplexity_sentiment else {
        bail!("structural error: top-level key `perplexity_sentiment` is missing");
    };
    if sentiment_input.is_empty() {
        bail!("structural error: `perplexity_sentiment` is present but empty");
    }

    let rng_root = BootstrapRng::from_seed(rng_seed);

    info!("running sentiment bias analysis (C4)");
    let sentiment_bias_analysis = sentiment::analyze_sentiment_bias(sentiment_input, &rng_root);
    if sentiment_bias_analysis.is_empty() {
        warn!("no subcategory survived validation; emitting an envelope with empty sentiment results");
    }

    info!("running ranking bias analysis (C5)");
    let ranking_bias_analysis = record
        .perplexity_rankings
        .as_ref()
        .map(|input| ranking_bias::analyze_ranking_bias(input, &rng_root))
        .unwrap_or_default();

    info!("running citations-vs-search comparison (C6)");
    let citations_google_comparison = match (&record.google_data, &record.perplexity_citations) {
        (Some(google), Some(perplexity_citations)) => citations::analyze_citations(google, perplexity_citations),
        _ => Default::default(),
    };

    info!("running relative/market-structure analysis (C7)");
    let relative_bias_analysis = market_structure::analyze_market_structure(&sentiment_bias_analysis, market);

    info!("running cross-analysis synthesis (C8)");
    let cross_analysis_insights = cross_analysis::analyze_cross_analysis(
        &sentiment_bias_analysis,
        &ranking_bias_analysis,
        &citations_google_comparison,
        market,
    );

    let execution_count = derive_execution_count(&sentiment_bias_analysis);
    let reliability_tier = ReliabilityTier::from_execution_count(execution_count);
    let data_availability_summary = reliability::availability_table(execution_count);

    let metadata = Metadata {
        analysis_date: analysis_date.to_string(),
        analysis_version: ANALYSIS_VERSION.to_string(),
        source_data: source_data.to_string(),
        execution_count,
        reliability_level: reliability_tier,
        confidence_level: reliability_tier.confidence().to_string(),
    };

    let analysis_limitations = build_limitations(execution_count, reliability_tier);

    Ok(AnalysisEnvelope {
        metadata,
        sentiment_bias_analysis,
        ranking_bias_analysis,
        citations_google_comparison,
        relative_bias_analysis,
        cross_analysis_insights,
        data_availability_summary,
        analysis_limitations,
    })
}

/// Flat per-entity CSV summary, additive alongside the JSON envelope
/// (SPEC_FULL.md §B.2, grounded in
/// `examples/original_source/src/analysis/bias_metrics.py::export_results`).
pub fn render_csv_summary(envelope: &AnalysisEnvelope) -> String {
    let mut out = String::from("category,subcategory,entity,raw_delta,bias_index,bias_rank,severity_score\n");
    for (category, subs) in &envelope.sentiment_bias_analysis {
        for (subcategory, sub) in subs {
            for entity in &sub.entities {
                let severity = entity
                    .severity_score
                    .as_ref()
                    .map(|s| s.severity_score.to_string())
                    .unwrap_or_default();
                out.push_str(&format!(
                    "{},{},{},{},{},{},{}\n",
                    category,
                    subcategory,
                    entity.entity,
                    entity.basic_metrics.raw_delta,
                    entity.bias_index,
                    entity.bias_rank,
                    severity
                ));
            }
        }
    }
    out
}

pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_error_on_missing_sentiment_block() {
        let record = IntegratedRecord::default();
        let market = MarketReference::empty();
        let result = run_analysis(&record, &market, 1, "20260101", "test");
        assert!(result.is_err());
    }

    #[test]
    fn runs_end_to_end_on_a_minimal_record() {
        let raw = r#"{
            "perplexity_sentiment": {
                "retail": {
                    "widgets": {
                        "masked_values": [3, 3, 3, 3, 3],
                        "entities": {
                            "Acme": { "unmasked_values": [4, 4, 4, 4, 4] }
                        }
                    }
                }
            }
        }"#;
        let record: IntegratedRecord = serde_json::from_str(raw).context("parse").unwrap();
        let market = MarketReference::empty();
        let envelope = run_analysis(&record, &market, 7, "20260101", "test").unwrap();
        assert_eq!(envelope.metadata.execution_count, 5);
    }
}
