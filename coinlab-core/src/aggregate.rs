//! DatasetAggregator: concatenates per-asset feature tables into one
//! canonical table, tagging each row with its asset.

use crate::domain::{CanonicalRow, CanonicalTable, TransformedSeries, WindowSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AggregateError {
    #[error("nothing to aggregate: zero transformed series supplied")]
    EmptyInput,

    #[error("asset '{asset_id}' was transformed with windows {found:?}, expected {expected:?}")]
    WindowMismatch {
        asset_id: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

/// Concatenates transformed series in the order given.
///
/// No re-sorting across assets and no de-duplication: consumers filter by
/// asset before doing anything time-based.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetAggregator;

impl DatasetAggregator {
    /// Take ownership of every series and move its rows into the table.
    pub fn aggregate(
        &self,
        series: impl IntoIterator<Item = TransformedSeries>,
    ) -> Result<CanonicalTable, AggregateError> {
        let mut windows: Option<WindowSet> = None;
        let mut rows = Vec::new();

        for s in series {
            let expected = windows.get_or_insert_with(|| s.windows.clone());
            if *expected != s.windows {
                return Err(AggregateError::WindowMismatch {
                    asset_id: s.asset_id,
                    expected: expected.as_slice().to_vec(),
                    found: s.windows.as_slice().to_vec(),
                });
            }

            rows.reserve(s.rows.len());
            let asset_id = s.asset_id;
            rows.extend(s.rows.into_iter().map(|features| CanonicalRow {
                asset_id: asset_id.clone(),
                features,
            }));
        }

        let windows = windows.ok_or(AggregateError::EmptyInput)?;
        log::debug!("aggregated {} rows across windows {:?}", rows.len(), windows.as_slice());
        Ok(CanonicalTable { windows, rows })
    }
}
