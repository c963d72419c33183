//! Parallel per-asset transform with a failure report.
//!
//! Assets are independent, so the transform fans out over rayon. Output order
//! always matches input order regardless of scheduling.

use coinlab_core::data::DataError;
use coinlab_core::{AssetSeries, SeriesTransformer, TransformError, TransformedSeries};
use rayon::prelude::*;
use thiserror::Error;

/// Why one asset dropped out of a run.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("read failed: {0}")]
    Read(#[from] DataError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),
}

#[derive(Debug)]
pub struct AssetFailure {
    pub asset_id: String,
    pub error: AssetError,
}

/// Per-asset outcome of extract + transform.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<AssetFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// True when nothing made it through (including an empty batch).
    pub fn none_succeeded(&self) -> bool {
        self.succeeded.is_empty()
    }

    pub fn record_failure(&mut self, asset_id: impl Into<String>, error: impl Into<AssetError>) {
        self.failed.push(AssetFailure {
            asset_id: asset_id.into(),
            error: error.into(),
        });
    }

    pub fn failure(&self, asset_id: &str) -> Option<&AssetError> {
        self.failed
            .iter()
            .find(|f| f.asset_id == asset_id)
            .map(|f| &f.error)
    }
}

/// Transform every series in parallel.
///
/// Successful outputs come back in input order; failures are appended to
/// `report` with the transformer's asset/row/field context intact.
pub fn transform_all(
    transformer: &SeriesTransformer,
    series: &[AssetSeries],
    report: &mut BatchReport,
) -> Vec<TransformedSeries> {
    let results: Vec<Result<TransformedSeries, TransformError>> = series
        .par_iter()
        .map(|s| transformer.transform(s))
        .collect();

    let mut transformed = Vec::with_capacity(results.len());
    for (input, result) in series.iter().zip(results) {
        match result {
            Ok(t) => {
                log::debug!("{}: {} rows", t.asset_id, t.rows.len());
                report.succeeded.push(t.asset_id.clone());
                transformed.push(t);
            }
            Err(e) => {
                log::warn!("{}: {e}", input.asset_id);
                report.record_failure(input.asset_id.clone(), e);
            }
        }
    }
    transformed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use coinlab_core::RawPoint;

    fn series(id: &str, prices: &[f64]) -> AssetSeries {
        let base = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        AssetSeries::new(
            id,
            prices
                .iter()
                .enumerate()
                .map(|(i, &p)| RawPoint::new(base + Duration::days(i as i64), p))
                .collect(),
        )
    }

    #[test]
    fn preserves_input_order() {
        let inputs: Vec<AssetSeries> = (0..32)
            .map(|i| series(&format!("asset{i:02}"), &[1.0 + i as f64, 2.0, 3.0]))
            .collect();
        let mut report = BatchReport::default();
        let out = transform_all(&SeriesTransformer::default(), &inputs, &mut report);

        let ids: Vec<&str> = out.iter().map(|t| t.asset_id.as_str()).collect();
        let expected: Vec<String> = (0..32).map(|i| format!("asset{i:02}")).collect();
        assert_eq!(ids, expected);
        assert_eq!(report.succeeded, expected);
        assert!(report.all_succeeded());
    }

    #[test]
    fn failures_keep_row_and_field() {
        let inputs = vec![
            series("good", &[1.0, 2.0]),
            series("bad", &[1.0, f64::INFINITY]),
            AssetSeries::new("empty", vec![]),
        ];
        let mut report = BatchReport::default();
        let out = transform_all(&SeriesTransformer::default(), &inputs, &mut report);

        assert_eq!(out.len(), 1);
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded, vec!["good"]);

        match report.failure("bad") {
            Some(AssetError::Transform(TransformError::MalformedInput { row, field, .. })) => {
                assert_eq!(*row, 1);
                assert_eq!(field, "price");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            report.failure("empty"),
            Some(AssetError::Transform(TransformError::EmptySeries { .. }))
        ));
    }

    #[test]
    fn empty_batch_has_no_successes() {
        let mut report = BatchReport::default();
        let out = transform_all(&SeriesTransformer::default(), &[], &mut report);
        assert!(out.is_empty());
        assert!(report.none_succeeded());
        assert!(report.all_succeeded());
    }
}
