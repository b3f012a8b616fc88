//! Display-rounding helpers.
//!
//! §6 requires round-half-to-even at 3 decimals for score/ratio/index fields
//! and 4 decimals for p-values. `f64::round` rounds half-away-from-zero, so
//! we go through a scaled `round_ties_even` instead.

/// Round to `decimals` places using round-half-to-even.
pub fn round_even(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Round a display score/ratio/index field (3 decimals, §6).
pub fn round3(value: f64) -> f64 {
    round_even(value, 3)
}

/// Round a p-value field (4 decimals, §6).
pub fn round4(value: f64) -> f64 {
    round_even(value, 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round_even(0.1235, 3), 0.124);
        assert_eq!(round_even(0.1245, 3), 0.124);
    }

    #[test]
    fn leaves_non_finite_alone() {
        assert!(round3(f64::NAN).is_nan());
    }
}
