//! Rolling sample standard deviation.
//!
//! Uses the unbiased (N-1) divisor, so a window of one observation is
//! `Some(NaN)` rather than zero. Each window is evaluated in two passes
//! (mean, then squared deviations) to avoid catastrophic cancellation on
//! large price levels.
//! Lookback: period - 1.

use super::RollingStat;

#[derive(Debug, Clone)]
pub struct RollingStd {
    period: usize,
    name: String,
}

impl RollingStd {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RollingStd period must be >= 1");
        Self {
            period,
            name: format!("volatility_{period}d"),
        }
    }
}

impl RollingStat for RollingStd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, values: &[f64]) -> Vec<Option<f64>> {
        let n = values.len();
        let mut result = vec![None; n];

        if n < self.period {
            return result;
        }

        let divisor = (self.period - 1) as f64;
        for i in (self.period - 1)..n {
            let window = &values[(i + 1 - self.period)..=i];
            let mean = window.iter().sum::<f64>() / self.period as f64;
            let ss: f64 = window.iter().map(|v| (v - mean).powi(2)).sum();
            // 0/0 for a single observation yields NaN
            result[i] = Some((ss / divisor).sqrt());
        }

        result
    }
}
