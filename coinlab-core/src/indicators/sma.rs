//! Simple Moving Average (SMA).
//!
//! Rolling mean of prices over a trailing window. Each window is summed
//! afresh; a running sum would carry rounding error from earlier, larger
//! prices into every later mean.
//! Lookback: period - 1 (first defined value at index period-1).

use super::RollingStat;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("ma_{period}d"),
        }
    }
}

impl RollingStat for Sma {
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

        for i in (self.period - 1)..n {
            let window = &values[(i + 1 - self.period)..=i];
            result[i] = Some(window.iter().sum::<f64>() / self.period as f64);
        }

        result
    }
}
