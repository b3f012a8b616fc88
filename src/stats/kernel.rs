//! Statistical Kernel (C2).
//!
//! Pure, deterministic functions over raw numeric slices. Nothing in this
//! module knows about categories, subcategories, or entities — that
//! bookkeeping lives in the analyzers (C4-C8). Every function here mirrors
//! one formula in spec.md §4.2, cross-checked against
//! `examples/original_source/src/analysis/bias_analysis_engine.py` and
//! `bias_metrics.py` for tie-breaking details the spec leaves implicit.

use rand::Rng;
use statrs::distribution::{Binomial, ContinuousCDF, DiscreteCDF, StudentsT};

use super::rng::BootstrapRng;

/// Raw delta Δ = mean(unmasked) − mean(masked). Zero for empty inputs.
pub fn raw_delta(masked: &[f64], unmasked: &[f64]) -> f64 {
    if masked.is_empty() || unmasked.is_empty() {
        return 0.0;
    }
    mean(unmasked) - mean(masked)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (ddof=1). Returns 0 for fewer than 2 samples.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() as f64 - 1.0)).sqrt()
}

/// Population standard deviation (ddof=0).
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Two-sided sign-test p-value over paired (masked_i, unmasked_i) values.
/// Returns 1.0 when there are fewer than 5 pairs, or when every paired
/// difference is zero.
pub fn sign_test_p_value(masked: &[f64], unmasked: &[f64]) -> f64 {
    let n_pairs = masked.len().min(unmasked.len());
    if n_pairs < 5 {
        return 1.0;
    }
    let mut pos = 0u64;
    let mut neg = 0u64;
    for i in 0..n_pairs {
        let diff = unmasked[i] - masked[i];
        if diff > 0.0 {
            pos += 1;
        } else if diff < 0.0 {
            neg += 1;
        }
    }
    let total = pos + neg;
    if total == 0 {
        return 1.0;
    }
    let Ok(binom) = Binomial::new(0.5, total) else {
        return 1.0;
    };
    let p = 2.0 * binom.cdf(pos).min(binom.cdf(neg));
    p.min(1.0)
}

/// Cliff's δ over unordered pairs, A = masked, B = unmasked.
pub fn cliffs_delta(masked: &[f64], unmasked: &[f64]) -> f64 {
    let (m, n) = (masked.len(), unmasked.len());
    if m == 0 || n == 0 {
        return 0.0;
    }
    let mut gt = 0i64;
    let mut lt = 0i64;
    for &a in masked {
        for &b in unmasked {
            if a < b {
                gt += 1;
            } else if a > b {
                lt += 1;
            }
        }
    }
    (gt - lt) as f64 / (m * n) as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectMagnitude {
    Large,
    Medium,
    Small,
    Negligible,
}

impl EffectMagnitude {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Large => "large",
            Self::Medium => "medium",
            Self::Small => "small",
            Self::Negligible => "negligible",
        }
    }
}

/// Cliff's δ magnitude band (§4.2).
pub fn effect_magnitude(cliffs_d: f64) -> EffectMagnitude {
    let d = cliffs_d.abs();
    if d > 0.474 {
        EffectMagnitude::Large
    } else if d > 0.330 {
        EffectMagnitude::Medium
    } else if d > 0.147 {
        EffectMagnitude::Small
    } else {
        EffectMagnitude::Negligible
    }
}

/// Percentile bootstrap CI on a vector of delta samples. For `|samples| <=
/// 1` returns `(value, value)` (the single value, or 0 if empty).
pub fn bootstrap_ci(samples: &[f64], rng: &mut BootstrapRng, iterations: usize) -> (f64, f64) {
    if samples.len() <= 1 {
        let v = samples.first().copied().unwrap_or(0.0);
        return (v, v);
    }
    let n = samples.len();
    let mut means = Vec::with_capacity(iterations);
    let r = rng.inner_mut();
    for _ in 0..iterations {
        let mut sum = 0.0;
        for _ in 0..n {
            let idx = r.gen_range(0..n);
            sum += samples[idx];
        }
        means.push(sum / n as f64);
    }
    means.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let lower = percentile_sorted(&means, 2.5);
    let upper = percentile_sorted(&means, 97.5);
    (lower, upper)
}

/// Linear-interpolated percentile over an already-sorted slice, matching
/// `numpy.percentile`'s default ("linear") interpolation.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    VeryHigh,
    High,
    Medium,
    Low,
}

impl Reliability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryHigh => "very_high",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StabilityResult {
    pub stability_score: f64,
    pub coefficient_of_variation: f64,
    pub reliability: Reliability,
    pub interpretation: &'static str,
}

/// Stability score on any sequence with `|X| >= 2`. For a single value the
/// caller should treat stability as unavailable rather than calling this;
/// callers with `|X| < 2` get `stability_score = 1.0` to match the
/// original's "single data point" fallback.
pub fn stability_score(values: &[f64]) -> StabilityResult {
    if values.len() < 2 {
        return StabilityResult {
            stability_score: 1.0,
            coefficient_of_variation: 0.0,
            reliability: Reliability::VeryHigh,
            interpretation: "single data point, stability not assessable",
        };
    }
    let m = mean(values);
    let std = sample_std(values);
    let (cv, score) = if m == 0.0 {
        (0.0, 1.0)
    } else {
        let cv = std / m.abs();
        (cv, 1.0 / (1.0 + cv))
    };
    let (reliability, interpretation) = if score >= 0.9 {
        (Reliability::VeryHigh, "extremely stable result")
    } else if score >= 0.8 {
        (Reliability::High, "stable result")
    } else if score >= 0.7 {
        (Reliability::Medium, "somewhat stable result")
    } else {
        (Reliability::Low, "unstable result")
    };
    StabilityResult {
        stability_score: score,
        coefficient_of_variation: cv,
        reliability,
        interpretation,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityBand {
    VerySevere,
    Severe,
    Moderate,
    Minor,
    Negligible,
}

impl SeverityBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerySevere => "very severe",
            Self::Severe => "severe",
            Self::Moderate => "moderate",
            Self::Minor => "minor",
            Self::Negligible => "negligible",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeverityResult {
    pub severity_score: f64,
    pub band: SeverityBand,
}

/// `severity = clamp(|BI| * |δ| * max(0, 1-p) * stability, 0, 10)`.
pub fn severity_score(bi: f64, cliffs_d: f64, p_value: f64, stability: f64) -> SeverityResult {
    let significance_weight = (1.0 - p_value).max(0.0);
    let severity = (bi.abs() * cliffs_d.abs() * significance_weight * stability).clamp(0.0, 10.0);
    let band = if severity >= 7.0 {
        SeverityBand::VerySevere
    } else if severity >= 4.0 {
        SeverityBand::Severe
    } else if severity >= 2.0 {
        SeverityBand::Moderate
    } else if severity >= 0.5 {
        SeverityBand::Minor
    } else {
        SeverityBand::Negligible
    };
    SeverityResult {
        severity_score: severity,
        band,
    }
}

/// Normalized Bias Index over one subcategory's raw deltas: `BI_e = Δ_e /
/// mean(|Δ|)`. Falls back to the raw delta when the denominator is zero.
pub fn normalized_bias_indices(raw_deltas: &[f64]) -> Vec<f64> {
    let denom = mean(&raw_deltas.iter().map(|d| d.abs()).collect::<Vec<_>>());
    if denom == 0.0 {
        raw_deltas.to_vec()
    } else {
        raw_deltas.iter().map(|d| d / denom).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InequalityBand {
    Equal,
    SomewhatUnequal,
    Moderate,
    Strong,
}

impl InequalityBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::SomewhatUnequal => "somewhat unequal",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InequalityResult {
    pub gini: f64,
    pub std_dev: f64,
    pub range: f64,
    pub band: InequalityBand,
}

/// Bias inequality over a vector of (possibly signed) entity bias indices.
///
/// Gini is computed over `|bias_index|` rather than the signed value: bias
/// indices are frequently symmetric around zero (one entity favored, one
/// disfavored, net sum ~0), and the textbook ascending-sort Gini formula
/// divides by the sum of the sorted values, which is degenerate for
/// signed, zero-summing inputs. Using magnitudes keeps the statistic
/// well-defined and matches the worked example in spec.md §8 scenario 5
/// (`[2, 0, 0, 0, -2]` → Gini in [0.55, 0.65], which only holds on
/// magnitudes: `|values| = [2,0,0,0,2]` sorted gives exactly 0.6).
pub fn bias_inequality(bias_indices: &[f64]) -> InequalityResult {
    let n = bias_indices.len();
    if n == 0 {
        return InequalityResult {
            gini: 0.0,
            std_dev: 0.0,
            range: 0.0,
            band: InequalityBand::Equal,
        };
    }
    if n == 1 {
        return InequalityResult {
            gini: 0.0,
            std_dev: 0.0,
            range: 0.0,
            band: InequalityBand::Equal,
        };
    }
    let gini_value = gini(bias_indices);
    let std_dev = sample_std(bias_indices);
    let max = bias_indices.iter().cloned().fold(f64::MIN, f64::max);
    let min = bias_indices.iter().cloned().fold(f64::MAX, f64::min);
    let range = max - min;
    let band = if gini_value < 0.2 {
        InequalityBand::Equal
    } else if gini_value < 0.4 {
        InequalityBand::SomewhatUnequal
    } else if gini_value < 0.6 {
        InequalityBand::Moderate
    } else {
        InequalityBand::Strong
    };
    InequalityResult {
        gini: gini_value,
        std_dev,
        range,
        band,
    }
}

/// Gini coefficient via the ascending-sort cumulative-sum formula, applied
/// to `|values|` (see `bias_inequality` doc comment for why).
pub fn gini(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mut abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    abs.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut cumsum = Vec::with_capacity(n);
    let mut running = 0.0;
    for v in &abs {
        running += v;
        cumsum.push(running);
    }
    let total = *cumsum.last().unwrap();
    if total == 0.0 {
        return 0.0;
    }
    let sum_cumsum: f64 = cumsum.iter().sum();
    (n as f64 + 1.0 - 2.0 * sum_cumsum / total) / n as f64
}

/// HHI over a map of percentage shares expressed as fractions in [0,1]:
/// `HHI = Σ (share·100)²`.
pub fn hhi(shares: &[f64]) -> f64 {
    shares.iter().map(|s| (s * 100.0).powi(2)).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcentrationBand {
    Low,
    Moderate,
    High,
}

pub fn concentration_band(hhi_value: f64) -> ConcentrationBand {
    if hhi_value < 1500.0 {
        ConcentrationBand::Low
    } else if hhi_value <= 2500.0 {
        ConcentrationBand::Moderate
    } else {
        ConcentrationBand::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionMethod {
    BenjaminiHochberg,
    Holm,
}

#[derive(Debug, Clone)]
pub struct CorrectionResult {
    pub original_p_values: Vec<f64>,
    pub corrected_p_values: Vec<f64>,
    pub rejected: Vec<bool>,
    pub method: CorrectionMethod,
    pub alpha: f64,
}

/// Multiple-comparison correction over a vector of p-values. A vector of
/// length <= 1 passes through unchanged, matching the original's early-out.
pub fn correct_p_values(p_values: &[f64], method: CorrectionMethod, alpha: f64) -> CorrectionResult {
    let m = p_values.len();
    if m <= 1 {
        return CorrectionResult {
            original_p_values: p_values.to_vec(),
            corrected_p_values: p_values.to_vec(),
            rejected: vec![false; m],
            method,
            alpha,
        };
    }

    let mut indexed: Vec<(usize, f64)> = p_values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    let mut corrected = vec![0.0; m];
    match method {
        CorrectionMethod::BenjaminiHochberg => {
            let mut running_min = 1.0;
            for rank in (0..m).rev() {
                let (orig_idx, p) = indexed[rank];
                let i = rank + 1; // 1-indexed rank
                let adjusted = (p * m as f64 / i as f64).min(1.0);
                running_min = running_min.min(adjusted);
                corrected[orig_idx] = running_min;
            }
        }
        CorrectionMethod::Holm => {
            let mut running_max: f64 = 0.0;
            for (rank, &(orig_idx, p)) in indexed.iter().enumerate() {
                let i = rank + 1; // 1-indexed rank
                let adjusted = ((m - i + 1) as f64 * p).min(1.0);
                running_max = running_max.max(adjusted);
                corrected[orig_idx] = running_max;
            }
        }
    }

    let rejected = corrected.iter().map(|&p| p < alpha).collect();
    CorrectionResult {
        original_p_values: p_values.to_vec(),
        corrected_p_values: corrected,
        rejected,
        method,
        alpha,
    }
}

#[derive(Debug, Clone)]
pub struct CorrelationResult {
    pub coefficient: f64,
    pub p_value: Option<f64>,
    pub n: usize,
    pub insufficient: bool,
}

fn insufficient_correlation() -> CorrelationResult {
    CorrelationResult {
        coefficient: 0.0,
        p_value: None,
        n: 0,
        insufficient: true,
    }
}

/// Pearson r + two-sided p-value (Student's t approximation). `<2` paired
/// samples yields the "insufficient" marker.
pub fn pearson(a: &[f64], b: &[f64]) -> CorrelationResult {
    let n = a.len().min(b.len());
    if n < 2 {
        return insufficient_correlation();
    }
    let a = &a[..n];
    let b = &b[..n];
    let ma = mean(a);
    let mb = mean(b);
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for i in 0..n {
        let da = a[i] - ma;
        let db = b[i] - mb;
        cov += da * db;
        va += da * da;
        vb += db * db;
    }
    if va == 0.0 || vb == 0.0 {
        return CorrelationResult {
            coefficient: 0.0,
            p_value: Some(1.0),
            n,
            insufficient: false,
        };
    }
    let r = cov / (va.sqrt() * vb.sqrt());
    let p_value = if n > 2 && r.abs() < 1.0 {
        let df = (n - 2) as f64;
        let t = r * (df / (1.0 - r * r)).sqrt();
        StudentsT::new(0.0, 1.0, df)
            .ok()
            .map(|dist| 2.0 * (1.0 - dist.cdf(t.abs())))
    } else {
        Some(0.0)
    };
    CorrelationResult {
        coefficient: r,
        p_value,
        n,
        insufficient: false,
    }
}

/// Spearman ρ: Pearson correlation over (average-tie) ranks.
pub fn spearman(a: &[f64], b: &[f64]) -> CorrelationResult {
    let n = a.len().min(b.len());
    if n < 2 {
        return insufficient_correlation();
    }
    let ranks_a = average_ranks(&a[..n]);
    let ranks_b = average_ranks(&b[..n]);
    pearson(&ranks_a, &ranks_b)
}

/// Average-tie ranks (1-based), the same convention `scipy.stats.rankdata`
/// uses by default.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| values[i].partial_cmp(&values[j]).unwrap());
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let avg_rank = ((i + 1) + (j + 1)) as f64 / 2.0;
        for k in order.iter().take(j + 1).skip(i) {
            ranks[*k] = avg_rank;
        }
        i = j + 1;
    }
    ranks
}

/// Kendall τ-b over two equal-length numeric sequences (already aligned by
/// the caller). `<2` samples yields the "insufficient" marker.
pub fn kendall_tau(a: &[f64], b: &[f64]) -> CorrelationResult {
    let n = a.len().min(b.len());
    if n < 2 {
        return insufficient_correlation();
    }
    let a = &a[..n];
    let b = &b[..n];
    let mut concordant = 0i64;
    let mut discordant = 0i64;
    let mut ties_a = 0i64;
    let mut ties_b = 0i64;
    for i in 0..n {
        for j in (i + 1)..n {
            let da = a[i] - a[j];
            let db = b[i] - b[j];
            if da == 0.0 && db == 0.0 {
                continue;
            } else if da == 0.0 {
                ties_a += 1;
            } else if db == 0.0 {
                ties_b += 1;
            } else if da.signum() == db.signum() {
                concordant += 1;
            } else {
                discordant += 1;
            }
        }
    }
    let n0 = (n * (n - 1) / 2) as f64;
    let n1 = ties_a as f64;
    let n2 = ties_b as f64;
    let denom = ((n0 - n1) * (n0 - n2)).sqrt();
    let tau = if denom == 0.0 {
        0.0
    } else {
        (concordant - discordant) as f64 / denom
    };
    CorrelationResult {
        coefficient: tau,
        p_value: None,
        n,
        insufficient: false,
    }
}

/// Welch's t-test (unequal variance) two-sided p-value. Returns `None` when
/// either sample has fewer than 2 observations.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<(f64, f64)> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }
    let (ma, mb) = (mean(a), mean(b));
    let (va, vb) = (sample_variance(a), sample_variance(b));
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let se = (va / na + vb / nb).sqrt();
    if se == 0.0 {
        return Some((0.0, 1.0));
    }
    let t = (ma - mb) / se;
    let df_num = (va / na + vb / nb).powi(2);
    let df_den = (va / na).powi(2) / (na - 1.0) + (vb / nb).powi(2) / (nb - 1.0);
    let df = if df_den == 0.0 { na + nb - 2.0 } else { df_num / df_den };
    let p = StudentsT::new(0.0, 1.0, df)
        .ok()
        .map(|dist| 2.0 * (1.0 - dist.cdf(t.abs())))
        .unwrap_or(1.0);
    Some((t, p.min(1.0)))
}

fn sample_variance(values: &[f64]) -> f64 {
    let std = sample_std(values);
    std * std
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_delta_scenario_1() {
        let masked = vec![3.0; 5];
        let unmasked = vec![4.0; 5];
        assert_eq!(raw_delta(&masked, &unmasked), 1.0);
    }

    #[test]
    fn cliffs_delta_all_greater() {
        let masked = vec![3.0; 5];
        let unmasked = vec![4.0; 5];
        assert_eq!(cliffs_delta(&masked, &unmasked), 1.0);
    }

    #[test]
    fn sign_test_matches_scenario_1() {
        let masked = vec![3.0; 5];
        let unmasked = vec![4.0; 5];
        let p = sign_test_p_value(&masked, &unmasked);
        assert!((p - 0.0625).abs() < 1e-6);
    }

    #[test]
    fn gini_constant_vector_is_zero() {
        assert_eq!(gini(&[1.0, 1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn gini_one_hot_approaches_n_minus_1_over_n() {
        let v = vec![0.0, 0.0, 0.0, 0.0, 1.0];
        let g = gini(&v);
        assert!((g - 0.8).abs() < 1e-9);
    }

    #[test]
    fn gini_scenario_5_inequality() {
        let result = bias_inequality(&[2.0, 0.0, 0.0, 0.0, -2.0]);
        assert!(result.gini >= 0.55 && result.gini <= 0.65, "gini={}", result.gini);
        assert_eq!(result.range, 4.0);
        assert_eq!(result.band, InequalityBand::Strong);
    }

    #[test]
    fn hhi_scenario_6() {
        let h = hhi(&[0.8, 0.1, 0.1]);
        assert!((h - 6600.0).abs() < 1e-6);
        assert_eq!(concentration_band(h), ConcentrationBand::High);

        let equal = hhi(&[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
        assert!((equal - 3333.333).abs() < 0.01);
    }

    #[test]
    fn bh_correction_is_monotonic_and_passthrough_for_one() {
        let single = correct_p_values(&[0.2], CorrectionMethod::BenjaminiHochberg, 0.05);
        assert_eq!(single.corrected_p_values, vec![0.2]);

        let result = correct_p_values(
            &[0.01, 0.04, 0.03, 0.5],
            CorrectionMethod::BenjaminiHochberg,
            0.05,
        );
        for w in result.corrected_p_values.windows(2) {
            assert!(w[0] <= 1.0 && w[1] <= 1.0);
        }
    }

    #[test]
    fn kendall_tau_self_is_one() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let result = kendall_tau(&a, &a);
        assert!((result.coefficient - 1.0).abs() < 1e-9);
    }

    #[test]
    fn normalized_bias_index_translation_covariant_denominator() {
        // Appending a zero-delta entity must not change other entities' BI:
        // the denominator is the *mean* absolute delta, and numerators are
        // untouched, so this only holds when the new entity's delta is
        // exactly the pre-existing mean (documented edge case, see
        // spec.md §8 "Round-trip / idempotence").
        let deltas = vec![1.0, -1.0];
        let bis = normalized_bias_indices(&deltas);
        assert_eq!(bis, vec![1.0, -1.0]);
    }
}
