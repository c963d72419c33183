//! SeriesTransformer: one asset's raw prices in, its full feature set out.
//!
//! Stateless. Every call is a pure function of the input series and the
//! configured window set, so assets can be transformed on separate threads
//! without coordination.

use crate::domain::{AssetSeries, FeatureRow, TransformedSeries, WindowSet, WindowStats};
use crate::indicators::{RollingStat, RollingStd, Sma};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("asset '{asset_id}': series is empty")]
    EmptySeries { asset_id: String },

    #[error("asset '{asset_id}': malformed input at row {row}, field '{field}': {reason}")]
    MalformedInput {
        asset_id: String,
        row: usize,
        field: String,
        reason: String,
    },
}

impl TransformError {
    /// The asset the failure belongs to.
    pub fn asset_id(&self) -> &str {
        match self {
            TransformError::EmptySeries { asset_id }
            | TransformError::MalformedInput { asset_id, .. } => asset_id,
        }
    }
}

/// Computes moving averages, rolling volatility, returns and drawdown.
#[derive(Debug, Clone, Default)]
pub struct SeriesTransformer {
    windows: WindowSet,
}

impl SeriesTransformer {
    pub fn new(windows: WindowSet) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &WindowSet {
        &self.windows
    }

    /// Transform one asset's series.
    ///
    /// Points are stable-sorted by timestamp first; duplicates are kept.
    pub fn transform(&self, series: &AssetSeries) -> Result<TransformedSeries, TransformError> {
        if series.points.is_empty() {
            return Err(TransformError::EmptySeries {
                asset_id: series.asset_id.clone(),
            });
        }

        if let Some((row, point)) = series
            .points
            .iter()
            .enumerate()
            .find(|(_, p)| !p.price.is_finite())
        {
            return Err(TransformError::MalformedInput {
                asset_id: series.asset_id.clone(),
                row,
                field: "price".into(),
                reason: format!("non-finite price {}", point.price),
            });
        }

        let mut points = series.points.clone();
        // Vec::sort_by_key is stable: ties keep their input order
        points.sort_by_key(|p| p.timestamp);

        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
        let returns = pct_change(&prices);
        let cumulative = cumulative_return(&returns);
        let from_start = return_from_start(&prices);
        let drawdowns = drawdown(&prices);

        let window_columns: Vec<(usize, Vec<Option<f64>>, Vec<Option<f64>>)> = self
            .windows
            .iter()
            .map(|w| (w, Sma::new(w).compute(&prices), RollingStd::new(w).compute(&prices)))
            .collect();

        let rows = points
            .iter()
            .enumerate()
            .map(|(i, point)| FeatureRow {
                timestamp: point.timestamp,
                price: point.price,
                pct_change: returns[i],
                windows: window_columns
                    .iter()
                    .map(|(w, ma, vol)| WindowStats {
                        window: *w,
                        ma: ma[i],
                        volatility: vol[i],
                    })
                    .collect(),
                cumulative_return: cumulative[i],
                return_from_start: from_start[i],
                daily_return: returns[i],
                drawdown: drawdowns[i],
            })
            .collect();

        Ok(TransformedSeries {
            asset_id: series.asset_id.clone(),
            windows: self.windows.clone(),
            rows,
        })
    }
}

/// Lag-1 relative change: `price_t / price_{t-1} - 1`.
///
/// The first entry is `None`. A zero previous price yields `Some(NaN)`.
pub fn pct_change(prices: &[f64]) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(prices.len());
    if prices.is_empty() {
        return result;
    }
    result.push(None);
    for w in prices.windows(2) {
        result.push(Some(safe_ratio(w[1], w[0]) - 1.0));
    }
    result
}

/// Running product of `(1 + r)` minus one. A missing return counts as zero,
/// so the first value is exactly 0. NaN propagates once it appears.
pub fn cumulative_return(returns: &[Option<f64>]) -> Vec<f64> {
    let mut growth = 1.0;
    returns
        .iter()
        .map(|r| {
            growth *= 1.0 + r.unwrap_or(0.0);
            growth - 1.0
        })
        .collect()
}

/// `price_t / price_0 - 1`. NaN everywhere when `price_0 == 0`.
pub fn return_from_start(prices: &[f64]) -> Vec<f64> {
    let Some(&first) = prices.first() else {
        return Vec::new();
    };
    prices.iter().map(|&p| safe_ratio(p, first) - 1.0).collect()
}

/// `(price_t - running_max_t) / running_max_t`, inclusive of the current row.
///
/// Always <= 0 for positive prices. NaN while the running max is zero.
pub fn drawdown(prices: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    prices
        .iter()
        .map(|&p| {
            peak = peak.max(p);
            if peak == 0.0 {
                f64::NAN
            } else {
                (p - peak) / peak
            }
        })
        .collect()
}

/// Division with an explicit zero-denominator sentinel.
fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawPoint;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    const EPS: f64 = 1e-12;

    fn day(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(i)
    }

    fn series(prices: &[f64]) -> AssetSeries {
        AssetSeries::new(
            "bitcoin",
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| RawPoint::new(day(i as i64), p))
                .collect(),
        )
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn rising_prices_compound() {
        let out = SeriesTransformer::default()
            .transform(&series(&[100.0, 110.0, 121.0]))
            .unwrap();
        let rows = &out.rows;

        assert_eq!(rows[0].pct_change, None);
        assert!(close(rows[1].pct_change.unwrap(), 0.10));
        assert!(close(rows[2].pct_change.unwrap(), 0.10));

        assert_eq!(rows[0].cumulative_return, 0.0);
        assert!(close(rows[1].cumulative_return, 0.10));
        assert!(close(rows[2].cumulative_return, 0.21));

        assert_eq!(rows[0].return_from_start, 0.0);
        assert!(close(rows[1].return_from_start, 0.10));
        assert!(close(rows[2].return_from_start, 0.21));

        assert!(rows.iter().all(|r| r.drawdown == 0.0));
        assert!(rows.iter().all(|r| r.daily_return == r.pct_change));
    }

    #[test]
    fn drawdown_tracks_running_max() {
        let out = SeriesTransformer::default()
            .transform(&series(&[100.0, 90.0, 95.0]))
            .unwrap();
        let dd: Vec<f64> = out.rows.iter().map(|r| r.drawdown).collect();
        assert_eq!(dd[0], 0.0);
        assert!(close(dd[1], -0.10));
        assert!(close(dd[2], -0.05));
    }

    #[test]
    fn short_series_has_no_window_values() {
        let out = SeriesTransformer::default()
            .transform(&series(&[1.0, 2.0, 3.0, 4.0, 5.0]))
            .unwrap();
        for row in &out.rows {
            assert_eq!(row.ma(7), None);
            assert_eq!(row.volatility(7), None);
        }
    }

    #[test]
    fn window_values_start_at_window_minus_one() {
        let prices: Vec<f64> = (1..=20).map(f64::from).collect();
        let transformer = SeriesTransformer::new(WindowSet::new([7, 14]).unwrap());
        let out = transformer.transform(&series(&prices)).unwrap();

        for (i, row) in out.rows.iter().enumerate() {
            assert_eq!(row.ma(7).is_some(), i >= 6, "ma_7d at {i}");
            assert_eq!(row.volatility(14).is_some(), i >= 13, "volatility_14d at {i}");
        }
        // mean(1..=7) = 4
        assert!(close(out.rows[6].ma(7).unwrap(), 4.0));
    }

    #[test]
    fn single_point_series() {
        let out = SeriesTransformer::default()
            .transform(&series(&[42.0]))
            .unwrap();
        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!(row.pct_change, None);
        assert_eq!(row.cumulative_return, 0.0);
        assert_eq!(row.return_from_start, 0.0);
        assert_eq!(row.drawdown, 0.0);
        assert!(row.windows.iter().all(|w| w.ma.is_none() && w.volatility.is_none()));
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let mut s = series(&[100.0, 110.0, 121.0]);
        s.points.reverse();
        let out = SeriesTransformer::default().transform(&s).unwrap();
        let prices: Vec<f64> = out.rows.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![100.0, 110.0, 121.0]);
    }

    #[test]
    fn duplicate_timestamps_keep_input_order() {
        let s = AssetSeries::new(
            "dup",
            vec![
                RawPoint::new(day(1), 2.0),
                RawPoint::new(day(0), 1.0),
                RawPoint::new(day(1), 3.0),
            ],
        );
        let out = SeriesTransformer::default().transform(&s).unwrap();
        let prices: Vec<f64> = out.rows.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn empty_series_is_an_error() {
        let err = SeriesTransformer::default()
            .transform(&AssetSeries::new("ghost", vec![]))
            .unwrap_err();
        assert_eq!(err, TransformError::EmptySeries { asset_id: "ghost".into() });
        assert_eq!(err.asset_id(), "ghost");
    }

    #[test]
    fn non_finite_price_is_malformed() {
        let err = SeriesTransformer::default()
            .transform(&series(&[1.0, f64::NAN, 3.0]))
            .unwrap_err();
        match err {
            TransformError::MalformedInput { row, field, .. } => {
                assert_eq!(row, 1);
                assert_eq!(field, "price");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_start_price_yields_nan_sentinels() {
        let out = SeriesTransformer::default()
            .transform(&series(&[0.0, 1.0, 2.0]))
            .unwrap();
        assert!(out.rows.iter().all(|r| r.return_from_start.is_nan()));
        assert!(out.rows[0].drawdown.is_nan());
        assert_eq!(out.rows[1].drawdown, 0.0);
        assert!(out.rows[1].pct_change.unwrap().is_nan());
        assert!(out.rows[2].cumulative_return.is_nan());
    }
}
