//! Rank-list comparison primitives (C3), grounded in
//! `examples/original_source/src/analysis/rank_utils.py`: RBO, Kendall τ on
//! partial overlap, ΔRank, overlap ratio, and a compound-similarity
//! reconciliation used by C6/C8.

use std::collections::{BTreeMap, HashSet};

use crate::stats::kernel::{self, CorrelationResult};

/// First-occurrence index map, 1-based, deduping repeats the way the
/// original's `rank_map` does.
pub fn rank_map(list: &[String]) -> BTreeMap<String, usize> {
    let mut map = BTreeMap::new();
    for (i, item) in list.iter().enumerate() {
        map.entry(item.clone()).or_insert(i + 1);
    }
    map
}

fn dedupe_first_occurrence(list: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in list {
        if seen.insert(item.clone()) {
            out.push(item.clone());
        }
    }
    out
}

/// Rank-biased overlap with persistence `p` (§4.3 default 0.9). Empty input
/// yields 0.
pub fn rbo(list_a: &[String], list_b: &[String], p: f64) -> f64 {
    let a = dedupe_first_occurrence(list_a);
    let b = dedupe_first_occurrence(list_b);
    let depth = a.len().min(b.len());
    if depth == 0 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut set_a: HashSet<&str> = HashSet::new();
    let mut set_b: HashSet<&str> = HashSet::new();
    for d in 1..=depth {
        set_a.insert(a[d - 1].as_str());
        set_b.insert(b[d - 1].as_str());
        let overlap = set_a.intersection(&set_b).count() as f64;
        sum += (overlap / d as f64) * p.powi((d - 1) as i32);
    }
    sum * (1.0 - p)
}

/// Kendall τ over the intersection of two rankings' items. Fewer than 2
/// common items yields 0 with an "insufficient" marker (§4.3).
pub fn compute_tau(list_a: &[String], list_b: &[String]) -> CorrelationResult {
    let map_a = rank_map(list_a);
    let map_b = rank_map(list_b);
    let mut ranks_a = Vec::new();
    let mut ranks_b = Vec::new();
    for (item, &ra) in &map_a {
        if let Some(&rb) = map_b.get(item) {
            ranks_a.push(ra as f64);
            ranks_b.push(rb as f64);
        }
    }
    if ranks_a.len() < 2 {
        return CorrelationResult {
            coefficient: 0.0,
            p_value: None,
            n: ranks_a.len(),
            insufficient: true,
        };
    }
    let mut result = kernel::kendall_tau(&ranks_a, &ranks_b);
    if !result.coefficient.is_finite() {
        result.coefficient = 0.0;
    }
    result
}

/// ΔRank for items present in both lists: `rank_B - rank_A`. Items present
/// in only one list are omitted (reported as "missing" by the caller).
pub fn compute_delta_ranks(list_a: &[String], list_b: &[String]) -> BTreeMap<String, i64> {
    let map_a = rank_map(list_a);
    let map_b = rank_map(list_b);
    let mut out = BTreeMap::new();
    for (item, &ra) in &map_a {
        if let Some(&rb) = map_b.get(item) {
            out.insert(item.clone(), rb as i64 - ra as i64);
        }
    }
    out
}

/// Overlap ratio over top-k prefixes: `|A∩B| / |A∪B|`.
pub fn overlap_ratio(list_a: &[String], list_b: &[String], k: usize) -> f64 {
    let top_a: HashSet<&String> = list_a.iter().take(k).collect();
    let top_b: HashSet<&String> = list_b.iter().take(k).collect();
    if top_a.is_empty() && top_b.is_empty() {
        return 0.0;
    }
    let inter = top_a.intersection(&top_b).count();
    let union = top_a.union(&top_b).count();
    if union == 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

#[derive(Debug, Clone)]
pub struct RankingMetrics {
    pub rbo_score: f64,
    pub kendall_tau: f64,
    pub tau_available: bool,
    pub overlap_ratio: f64,
    pub delta_ranks: BTreeMap<String, i64>,
    pub common_count: usize,
}

pub const DEFAULT_RBO_PERSISTENCE: f64 = 0.9;
pub const DEFAULT_TOP_K: usize = 10;

/// Bundles RBO/τ/overlap/ΔRank for a pair of ranked lists, matching
/// `compute_ranking_metrics` in the original. Empty lists yield all-zero
/// metrics rather than an error.
pub fn compute_ranking_metrics(list_a: &[String], list_b: &[String]) -> RankingMetrics {
    if list_a.is_empty() || list_b.is_empty() {
        return RankingMetrics {
            rbo_score: 0.0,
            kendall_tau: 0.0,
            tau_available: false,
            overlap_ratio: 0.0,
            delta_ranks: BTreeMap::new(),
            common_count: 0,
        };
    }
    let tau_result = compute_tau(list_a, list_b);
    let delta_ranks = compute_delta_ranks(list_a, list_b);
    RankingMetrics {
        rbo_score: rbo(list_a, list_b, DEFAULT_RBO_PERSISTENCE),
        kendall_tau: tau_result.coefficient,
        tau_available: !tau_result.insufficient,
        overlap_ratio: overlap_ratio(list_a, list_b, DEFAULT_TOP_K),
        common_count: delta_ranks.len(),
        delta_ranks,
    }
}

/// Reconciles (τ, RBO, overlap, common-count) into a short, human-readable
/// "consistent"/"inconsistent" explanation (§4.3 "compound similarity
/// validation").
pub fn reconcile_similarity(metrics: &RankingMetrics) -> String {
    if metrics.common_count == 0 {
        return "no common items; similarity not assessable".to_string();
    }
    let tau_high = metrics.tau_available && metrics.kendall_tau.abs() >= 0.7;
    let rbo_high = metrics.rbo_score >= 0.7;
    let rbo_low = metrics.rbo_score < 0.3;
    let inverted = metrics.tau_available && metrics.kendall_tau <= -0.7;

    if tau_high && rbo_low && metrics.common_count <= 3 {
        return format!(
            "consistent: τ={:.2} but RBO is low because only {} items overlap near the tail",
            metrics.kendall_tau, metrics.common_count
        );
    }
    if inverted {
        return format!(
            "inconsistent: rank order is inverted (τ={:.2})",
            metrics.kendall_tau
        );
    }
    if tau_high && rbo_high {
        "consistent: strong agreement across both rank order and top-weighted overlap".to_string()
    } else if !tau_high && !rbo_high {
        "inconsistent: weak agreement across both rank order and top-weighted overlap".to_string()
    } else {
        "mixed: rank order and top-weighted overlap disagree".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rbo_self_is_one() {
        let a = names(&["a", "b", "c", "d"]);
        assert!((rbo(&a, &a, 0.9) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rbo_is_symmetric() {
        let a = names(&["a", "b", "c"]);
        let b = names(&["c", "a", "b"]);
        assert!((rbo(&a, &b, 0.9) - rbo(&b, &a, 0.9)).abs() < 1e-12);
    }

    #[test]
    fn rbo_is_bounded() {
        let a = names(&["a", "b", "c"]);
        let b = names(&["x", "y", "z"]);
        let score = rbo(&a, &b, 0.9);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn kendall_tau_self_is_one_for_two_plus() {
        let a = names(&["a", "b", "c"]);
        let result = compute_tau(&a, &a);
        assert!((result.coefficient - 1.0).abs() < 1e-9);
    }

    #[test]
    fn citation_mismatch_scenario_4() {
        let google = names(&["g1", "g2", "g3", "g4", "g5", "g6", "g7", "g8", "g9", "g10"]);
        let citations = names(&["g10", "g9", "g8", "g7", "g6", "g5", "g4", "g3", "g2", "g1"]);
        let metrics = compute_ranking_metrics(&google, &citations);
        assert_eq!(metrics.overlap_ratio, 1.0);
        assert!(metrics.rbo_score < 1.0);
        assert!((metrics.kendall_tau - (-1.0)).abs() < 1e-9);
        let explanation = reconcile_similarity(&metrics);
        assert!(explanation.contains("inverted"));
    }

    #[test]
    fn overlap_ratio_empty_inputs_is_zero() {
        assert_eq!(overlap_ratio(&[], &[], 10), 0.0);
    }
}
