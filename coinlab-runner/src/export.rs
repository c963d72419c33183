//! CSV export of analysis results.
//!
//! - **Correlation matrix**: assets as header row and first column
//! - **KPI summary**: one row per asset
//!
//! NaN cells (zero-variance assets) are written as `NaN`.

use std::path::Path;

use anyhow::{Context, Result};
use coinlab_core::CorrelationMatrix;

use crate::summary::AssetSummary;

// ─── Correlation ────────────────────────────────────────────────────

/// Export a correlation matrix as CSV.
///
/// Header: `asset,{asset_1},...,{asset_n}`; then one row per asset.
pub fn export_correlation_csv(matrix: &CorrelationMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = Vec::with_capacity(matrix.assets.len() + 1);
    header.push("asset");
    header.extend(matrix.assets.iter().map(String::as_str));
    wtr.write_record(&header)?;

    for (asset, row) in matrix.assets.iter().zip(&matrix.values) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(asset.clone());
        record.extend(row.iter().map(|v| format!("{v:.6}")));
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write the correlation CSV to `path`, creating parent directories.
pub fn save_correlation_csv(matrix: &CorrelationMatrix, path: &Path) -> Result<()> {
    let csv = export_correlation_csv(matrix)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

// ─── KPI summary ────────────────────────────────────────────────────

/// Columns: asset, rows, last_price, total_return, max_drawdown,
/// mean_volatility, insufficient
pub fn export_summary_csv(summaries: &[AssetSummary]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "asset",
        "rows",
        "last_price",
        "total_return",
        "max_drawdown",
        "mean_volatility",
        "insufficient",
    ])?;

    for s in summaries {
        wtr.write_record([
            s.asset_id.as_str(),
            &s.rows.to_string(),
            &format!("{:.6}", s.last_price),
            &format!("{:.6}", s.total_return),
            &format!("{:.6}", s.max_drawdown),
            &s.mean_volatility.map(|v| format!("{v:.6}")).unwrap_or_default(),
            &s.insufficient.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}
