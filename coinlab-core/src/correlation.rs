//! CorrelationEngine: pairwise Pearson correlation of daily returns.
//!
//! The canonical table is pivoted to timestamp x asset, every timestamp with
//! a missing return in any asset is dropped (full-row alignment), and the
//! correlation is computed over what remains. Too little data is an expected
//! outcome and is reported as `Correlation::InsufficientData`, not an error.

use crate::domain::CanonicalTable;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CorrelationError {
    #[error("asset '{asset_id}' has more than one row at {timestamp} (table row {row}); pivot is ambiguous")]
    DuplicateObservation {
        asset_id: String,
        timestamp: NaiveDateTime,
        row: usize,
    },
}

/// Why no matrix could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsufficientData {
    /// Fewer than two assets in the table.
    TooFewAssets { found: usize },
    /// Fewer than two timestamps where every asset has a return.
    TooFewAlignedRows { found: usize },
}

/// Square, symmetric correlation matrix indexed by asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Row/column order.
    pub assets: Vec<String>,
    /// `values[i][j]` is corr(assets[i], assets[j]). NaN if either column has
    /// zero variance after alignment.
    pub values: Vec<Vec<f64>>,
    /// Number of fully aligned timestamps used.
    pub aligned_rows: usize,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.assets.iter().position(|x| x == a)?;
        let j = self.assets.iter().position(|x| x == b)?;
        Some(self.values[i][j])
    }
}

/// Result of a correlation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Correlation {
    Matrix(CorrelationMatrix),
    InsufficientData(InsufficientData),
}

impl Correlation {
    pub fn matrix(&self) -> Option<&CorrelationMatrix> {
        match self {
            Correlation::Matrix(m) => Some(m),
            Correlation::InsufficientData(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationEngine;

impl CorrelationEngine {
    pub fn correlate(&self, table: &CanonicalTable) -> Result<Correlation, CorrelationError> {
        let assets: Vec<String> = table.assets().into_iter().map(String::from).collect();
        if assets.len() < 2 {
            return Ok(Correlation::InsufficientData(InsufficientData::TooFewAssets {
                found: assets.len(),
            }));
        }

        let column: HashMap<&str, usize> = assets
            .iter()
            .enumerate()
            .map(|(i, a)| (a.as_str(), i))
            .collect();

        // Pivot: timestamp -> one slot per asset.
        let mut pivot: BTreeMap<NaiveDateTime, Vec<Option<Option<f64>>>> = BTreeMap::new();
        for (row_idx, row) in table.rows.iter().enumerate() {
            let col = column[row.asset_id.as_str()];
            let slots = pivot
                .entry(row.features.timestamp)
                .or_insert_with(|| vec![None; assets.len()]);
            if slots[col].is_some() {
                return Err(CorrelationError::DuplicateObservation {
                    asset_id: row.asset_id.clone(),
                    timestamp: row.features.timestamp,
                    row: row_idx,
                });
            }
            slots[col] = Some(row.features.daily_return);
        }

        // Full-row alignment: a timestamp survives only if every asset has a
        // non-NaN return there.
        let aligned: Vec<Vec<f64>> = pivot
            .into_values()
            .filter_map(|slots| {
                slots
                    .into_iter()
                    .map(|cell| cell.flatten().filter(|v| !v.is_nan()))
                    .collect::<Option<Vec<f64>>>()
            })
            .collect();

        if aligned.len() < 2 {
            return Ok(Correlation::InsufficientData(
                InsufficientData::TooFewAlignedRows {
                    found: aligned.len(),
                },
            ));
        }

        let columns: Vec<Vec<f64>> = (0..assets.len())
            .map(|j| aligned.iter().map(|r| r[j]).collect())
            .collect();

        let n = assets.len();
        let mut values = vec![vec![f64::NAN; n]; n];
        for i in 0..n {
            for j in i..n {
                let r = if i == j {
                    if has_variance(&columns[i]) {
                        1.0
                    } else {
                        f64::NAN
                    }
                } else {
                    pearson(&columns[i], &columns[j])
                };
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        log::debug!(
            "correlated {} assets over {} aligned rows",
            n,
            aligned.len()
        );

        Ok(Correlation::Matrix(CorrelationMatrix {
            assets,
            values,
            aligned_rows: aligned.len(),
        }))
    }
}

/// Pearson correlation of two equal-length samples. NaN if either has zero
/// variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    // One rounding in the divisor: identical samples give exactly 1.0
    (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0)
}

fn has_variance(x: &[f64]) -> bool {
    x.first().is_some_and(|first| x.iter().any(|v| v != first))
}
