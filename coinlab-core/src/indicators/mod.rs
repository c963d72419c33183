//! Trailing-window statistics over a price column.
//!
//! Rolling statistics are pure functions: a price slice in, a series of the
//! same length out. The first `lookback()` entries are `None` (warm-up);
//! every entry from `lookback()` on is `Some`.

pub mod rolling_std;
pub mod sma;

pub use rolling_std::RollingStd;
pub use sma::Sma;

/// A trailing-window statistic.
///
/// # Look-ahead guard
/// The value at index t may only depend on `values[..=t]`.
pub trait RollingStat: Send + Sync {
    /// Column-style name, e.g. `ma_30d`.
    fn name(&self) -> &str;

    /// Number of leading entries that stay `None`.
    fn lookback(&self) -> usize;

    /// Compute the statistic for the whole slice.
    fn compute(&self, values: &[f64]) -> Vec<Option<f64>>;
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    /// Truncating the input must not change any already-computed value.
    #[test]
    fn no_lookahead_for_any_stat() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let stats: Vec<Box<dyn RollingStat>> = vec![Box::new(Sma::new(7)), Box::new(RollingStd::new(7))];

        for stat in &stats {
            let full = stat.compute(&prices);
            let truncated = stat.compute(&prices[..25]);
            for (i, value) in truncated.iter().enumerate() {
                assert_eq!(*value, full[i], "{} differs at {i}", stat.name());
            }
        }
    }
}
