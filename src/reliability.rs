//! Reliability Gate (C1): maps an execution count N to a qualitative tier
//! and decides, per metric kind, whether N clears that metric's minimum.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityTier {
    ExecutionInsufficient,
    ReferenceOnly,
    Basic,
    Practical,
    Standard,
    HighPrecision,
}

impl ReliabilityTier {
    pub fn from_execution_count(n: usize) -> Self {
        match n {
            0 | 1 => ReliabilityTier::ExecutionInsufficient,
            2 => ReliabilityTier::ReferenceOnly,
            3..=4 => ReliabilityTier::Basic,
            5..=9 => ReliabilityTier::Practical,
            10..=19 => ReliabilityTier::Standard,
            _ => ReliabilityTier::HighPrecision,
        }
    }

    pub fn confidence(&self) -> &'static str {
        match self {
            ReliabilityTier::ExecutionInsufficient => "analysis not possible",
            ReliabilityTier::ReferenceOnly => "low",
            ReliabilityTier::Basic => "low",
            ReliabilityTier::Practical => "basic",
            ReliabilityTier::Standard => "medium",
            ReliabilityTier::HighPrecision => "high",
        }
    }
}

/// Which per-metric minimum-N a caller is asking about (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    RawDelta,
    NormalizedBiasIndex,
    SignTestPValue,
    CliffsDelta,
    BootstrapCi,
    StabilityScore,
    Correlation,
}

impl MetricKind {
    pub fn minimum_n(&self) -> usize {
        match self {
            MetricKind::RawDelta => 2,
            MetricKind::NormalizedBiasIndex => 3,
            MetricKind::SignTestPValue => 5,
            MetricKind::CliffsDelta => 5,
            MetricKind::BootstrapCi => 5,
            MetricKind::StabilityScore => 3,
            MetricKind::Correlation => 3,
        }
    }

    pub fn is_met_by(&self, n: usize) -> bool {
        n >= self.minimum_n()
    }
}

/// Per-metric availability table for one execution count, as surfaced in
/// `data_availability_summary` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityTable {
    pub execution_count: usize,
    pub reliability_tier: ReliabilityTier,
    pub metrics: Vec<MetricAvailability>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricAvailability {
    pub metric: MetricKind,
    pub available: bool,
    pub required_n: usize,
}

pub fn availability_table(execution_count: usize) -> AvailabilityTable {
    let kinds = [
        MetricKind::RawDelta,
        MetricKind::NormalizedBiasIndex,
        MetricKind::SignTestPValue,
        MetricKind::CliffsDelta,
        MetricKind::BootstrapCi,
        MetricKind::StabilityScore,
        MetricKind::Correlation,
    ];
    AvailabilityTable {
        execution_count,
        reliability_tier: ReliabilityTier::from_execution_count(execution_count),
        metrics: kinds
            .into_iter()
            .map(|kind| MetricAvailability {
                metric: kind,
                available: kind.is_met_by(execution_count),
                required_n: kind.minimum_n(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_match_spec_table() {
        assert_eq!(ReliabilityTier::from_execution_count(1), ReliabilityTier::ExecutionInsufficient);
        assert_eq!(ReliabilityTier::from_execution_count(2), ReliabilityTier::ReferenceOnly);
        assert_eq!(ReliabilityTier::from_execution_count(4), ReliabilityTier::Basic);
        assert_eq!(ReliabilityTier::from_execution_count(9), ReliabilityTier::Practical);
        assert_eq!(ReliabilityTier::from_execution_count(19), ReliabilityTier::Standard);
        assert_eq!(ReliabilityTier::from_execution_count(20), ReliabilityTier::HighPrecision);
    }

    #[test]
    fn n_equals_one_only_clears_nothing() {
        let table = availability_table(1);
        assert!(table.metrics.iter().all(|m| !m.available));
    }

    #[test]
    fn n_equals_two_clears_raw_delta_only() {
        let table = availability_table(2);
        let raw_delta = table
            .metrics
            .iter()
            .find(|m| m.metric == MetricKind::RawDelta)
            .unwrap();
        assert!(raw_delta.available);
        let sign_test = table
            .metrics
            .iter()
            .find(|m| m.metric == MetricKind::SignTestPValue)
            .unwrap();
        assert!(!sign_test.available);
    }
}
