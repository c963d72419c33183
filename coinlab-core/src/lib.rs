//! coinlab core: feature engineering for daily asset price histories.
//!
//! This crate contains:
//! - Domain types (raw points, asset series, feature rows, canonical table)
//! - Rolling statistics (SMA, sample standard deviation)
//! - `SeriesTransformer`: per-asset returns, rolling stats and drawdown
//! - `DatasetAggregator`: concatenation into one canonical table
//! - `CorrelationEngine`: full-row-aligned Pearson correlation of daily returns
//! - Data adapters: raw CSV ingest, canonical CSV/Parquet store, CoinGecko download

pub mod aggregate;
pub mod correlation;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod schema;
pub mod transform;

pub use aggregate::{AggregateError, DatasetAggregator};
pub use correlation::{
    Correlation, CorrelationEngine, CorrelationError, CorrelationMatrix, InsufficientData,
};
pub use domain::{
    AssetSeries, CanonicalRow, CanonicalTable, FeatureRow, RawPoint, TransformedSeries, WindowSet,
    WindowStats,
};
pub use transform::{SeriesTransformer, TransformError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything handed between threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<AssetSeries>();
        require_sync::<AssetSeries>();
        require_send::<TransformedSeries>();
        require_sync::<TransformedSeries>();
        require_send::<CanonicalTable>();
        require_sync::<CanonicalTable>();
        require_send::<CorrelationMatrix>();
        require_sync::<CorrelationMatrix>();
        require_send::<SeriesTransformer>();
        require_sync::<SeriesTransformer>();
        require_send::<TransformError>();
        require_sync::<TransformError>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<data::CoinGeckoProvider>();
        require_sync::<data::CoinGeckoProvider>();
    }

    #[test]
    fn transform_aggregate_correlate_compose() {
        use chrono::{Duration, NaiveDate};

        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let series = |id: &str, prices: &[f64]| {
            AssetSeries::new(
                id,
                prices
                    .iter()
                    .enumerate()
                    .map(|(i, &p)| RawPoint::new(base + Duration::days(i as i64), p))
                    .collect(),
            )
        };

        let transformer = SeriesTransformer::default();
        let transformed = vec![
            transformer.transform(&series("bitcoin", &[100.0, 104.0, 101.0, 108.0])).unwrap(),
            transformer.transform(&series("ethereum", &[10.0, 10.2, 9.9, 10.9])).unwrap(),
        ];
        let table = DatasetAggregator.aggregate(transformed).unwrap();
        assert_eq!(table.len(), 8);

        let corr = CorrelationEngine.correlate(&table).unwrap();
        let m = corr.matrix().expect("two assets with three aligned returns");
        assert_eq!(m.assets, vec!["bitcoin", "ethereum"]);
        assert_eq!(m.aligned_rows, 3);
    }
}
