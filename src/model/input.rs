//! Integrated input record (§3). Deserialized with `serde_json`; tolerant of
//! the original system's single-execution shorthand
//! (`masked_avg`/`unmasked_avg` scalars in place of arrays, SPEC_FULL.md §B.1).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One collection date's merged dataset. Top-level keys are optional except
/// `perplexity_sentiment`, whose absence is a fatal structural error (§6).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct IntegratedRecord {
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub perplexity_sentiment: Option<BTreeMap<String, BTreeMap<String, SentimentSubcategory>>>,
    #[serde(default)]
    pub perplexity_rankings: Option<BTreeMap<String, BTreeMap<String, RankingSubcategory>>>,
    #[serde(default)]
    pub google_data: Option<BTreeMap<String, BTreeMap<String, DomainSubcategory>>>,
    #[serde(default)]
    pub perplexity_citations: Option<BTreeMap<String, BTreeMap<String, DomainSubcategory>>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SentimentSubcategory {
    #[serde(default)]
    pub masked_values: Vec<f64>,
    #[serde(default)]
    pub masked_avg: Option<f64>,
    #[serde(default)]
    pub masked_prompt: Option<String>,
    #[serde(default)]
    pub masked_answer: Option<String>,
    #[serde(default)]
    pub entities: BTreeMap<String, SentimentEntity>,
}

impl SentimentSubcategory {
    /// Resolved masked values: the array if present, else a length-1
    /// sequence built from the scalar shorthand, else empty.
    pub fn resolved_masked_values(&self) -> Vec<f64> {
        if !self.masked_values.is_empty() {
            self.masked_values.clone()
        } else if let Some(avg) = self.masked_avg {
            vec![avg]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SentimentEntity {
    #[serde(default)]
    pub unmasked_values: Vec<f64>,
    #[serde(default)]
    pub unmasked_avg: Option<f64>,
}

impl SentimentEntity {
    pub fn resolved_unmasked_values(&self) -> Vec<f64> {
        if !self.unmasked_values.is_empty() {
            self.unmasked_values.clone()
        } else if let Some(avg) = self.unmasked_avg {
            vec![avg]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RankingSubcategory {
    pub ranking_summary: RankingSummary,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RankingSummary {
    #[serde(default)]
    pub entities: BTreeMap<String, RankingEntity>,
    #[serde(default)]
    pub avg_ranking: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RankingEntity {
    #[serde(default)]
    pub all_ranks: Vec<u32>,
    pub avg_rank: f64,
    #[serde(default)]
    pub official_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DomainSubcategory {
    #[serde(default)]
    pub entities: BTreeMap<String, DomainEntity>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DomainEntity {
    #[serde(default)]
    pub official_results: Vec<ResultItem>,
    #[serde(default)]
    pub reputation_results: Vec<ResultItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultItem {
    pub rank: u32,
    pub domain: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub sentiment: Option<ResultSentiment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSentiment {
    Positive,
    Negative,
    Neutral,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_scalar_expands_to_length_one() {
        let sub = SentimentSubcategory {
            masked_avg: Some(3.2),
            ..Default::default()
        };
        assert_eq!(sub.resolved_masked_values(), vec![3.2]);
    }

    #[test]
    fn array_form_wins_over_scalar_when_both_present() {
        let sub = SentimentSubcategory {
            masked_values: vec![1.0, 2.0],
            masked_avg: Some(3.2),
            ..Default::default()
        };
        assert_eq!(sub.resolved_masked_values(), vec![1.0, 2.0]);
    }
}
