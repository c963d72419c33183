//! Seeded random-walk price series for demos and tests.
//!
//! The seed is mixed with the asset id, so each asset gets its own walk and
//! the same (seed, asset) pair always produces the same prices. Synthetic
//! series are handed to the pipeline in memory and never written as raw files.

use chrono::{Duration, NaiveDate};
use coinlab_core::{AssetSeries, RawPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    pub seed: u64,
    pub start: NaiveDate,
    pub days: usize,
    pub start_price: f64,
    /// Daily moves are uniform in `[-daily_move, daily_move]`.
    pub daily_move: f64,
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self {
            seed: 42,
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            days: 365,
            start_price: 100.0,
            daily_move: 0.04,
        }
    }
}

impl SyntheticGenerator {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_days(mut self, days: usize) -> Self {
        self.days = days;
        self
    }

    /// One daily series, midnight timestamps starting at `start`.
    pub fn series(&self, asset_id: &str) -> AssetSeries {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(asset_id.as_bytes());
        let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

        let start = self.start.and_hms_opt(0, 0, 0).unwrap_or_default();
        let mut price = self.start_price;
        let mut points = Vec::with_capacity(self.days);
        for day in 0..self.days {
            if day > 0 {
                let step: f64 = rng.gen_range(-self.daily_move..=self.daily_move);
                price *= 1.0 + step;
            }
            points.push(RawPoint::new(start + Duration::days(day as i64), price));
        }
        AssetSeries::new(asset_id, points)
    }

    pub fn generate(&self, assets: &[&str]) -> Vec<AssetSeries> {
        assets.iter().map(|a| self.series(a)).collect()
    }
}
