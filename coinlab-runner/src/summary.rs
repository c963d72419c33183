//! Dashboard KPIs per asset.
//!
//! Computes the headline numbers the dashboard shows for one selected
//! window: last price, total return, max drawdown and mean volatility.
//! Chart rendering is not part of this crate.

use coinlab_core::CanonicalTable;
use serde::Serialize;
use thiserror::Error;

/// Fewer rows than this and the KPIs are flagged as unreliable.
pub const MIN_ROWS_FOR_KPIS: usize = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SummaryError {
    #[error("window {window} is not in the table's window set {available:?}")]
    UnknownWindow { window: usize, available: Vec<usize> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSummary {
    pub asset_id: String,
    pub rows: usize,
    pub last_price: f64,
    /// `return_from_start` of the last row.
    pub total_return: f64,
    /// Most negative drawdown; NaN rows are ignored.
    pub max_drawdown: f64,
    /// Mean of the defined, finite `volatility_{window}d` values.
    pub mean_volatility: Option<f64>,
    pub insufficient: bool,
}

/// Summaries in table asset order.
pub fn summarize(table: &CanonicalTable, window: usize) -> Result<Vec<AssetSummary>, SummaryError> {
    if !table.windows.contains(window) {
        return Err(SummaryError::UnknownWindow {
            window,
            available: table.windows.as_slice().to_vec(),
        });
    }

    let summaries = table
        .assets()
        .into_iter()
        .filter_map(|asset_id| {
            let rows: Vec<_> = table.rows_for(asset_id).collect();
            let last = rows.last()?;

            let max_drawdown = rows
                .iter()
                .map(|r| r.drawdown)
                .filter(|d| !d.is_nan())
                .fold(0.0_f64, f64::min);

            let vols: Vec<f64> = rows
                .iter()
                .filter_map(|r| r.volatility(window))
                .filter(|v| v.is_finite())
                .collect();
            let mean_volatility =
                (!vols.is_empty()).then(|| vols.iter().sum::<f64>() / vols.len() as f64);

            Some(AssetSummary {
                asset_id: asset_id.to_string(),
                rows: rows.len(),
                last_price: last.price,
                total_return: last.return_from_start,
                max_drawdown,
                mean_volatility,
                insufficient: rows.len() < MIN_ROWS_FOR_KPIS,
            })
        })
        .collect();
    Ok(summaries)
}
