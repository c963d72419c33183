//! Raw per-asset price files written by the acquisition step.
//!
//! Layout: `{raw_dir}/{asset}_{days}d.csv` with at least `timestamp` and
//! `price` columns. The asset id is the file-stem prefix before the first `_`.

use super::provider::DataError;
use super::timestamp::{format_timestamp, parse_timestamp};
use crate::domain::{AssetSeries, RawPoint};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// `bitcoin` + 365 → `bitcoin_365d.csv`
pub fn raw_file_name(asset_id: &str, days: u32) -> String {
    format!("{asset_id}_{days}d.csv")
}

/// `.../bitcoin_365d.csv` → `bitcoin`
pub fn asset_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let id = stem.split('_').next()?;
    (!id.is_empty()).then(|| id.to_string())
}

/// List raw files for the given history length, sorted by file name.
pub fn discover_raw_files(dir: &Path, days: u32) -> Result<Vec<PathBuf>, DataError> {
    let suffix = format!("_{days}d.csv");
    let entries = fs::read_dir(dir).map_err(|e| DataError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DataError::io(dir, e))?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&suffix));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read one raw file; the asset id comes from the file name.
pub fn read_raw_series(path: &Path) -> Result<AssetSeries, DataError> {
    let asset_id = asset_id_from_path(path).ok_or_else(|| DataError::MalformedInput {
        path: path.display().to_string(),
        row: 0,
        field: "file_name".into(),
        reason: "cannot derive asset id".into(),
    })?;
    let file = fs::File::open(path).map_err(|e| DataError::io(path, e))?;
    read_raw_csv(asset_id, file, &path.display().to_string())
}

/// Parse raw CSV content. `source` labels errors (usually the file path).
///
/// Rows are kept in file order; sorting is the transformer's job.
pub fn read_raw_csv<R: Read>(
    asset_id: String,
    reader: R,
    source: &str,
) -> Result<AssetSeries, DataError> {
    let malformed = |row: usize, field: &str, reason: String| DataError::MalformedInput {
        path: source.to_string(),
        row,
        field: field.to_string(),
        reason,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| DataError::CsvError(format!("{source}: header: {e}")))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| malformed(0, name, "missing required column".into()))
    };
    let ts_idx = column("timestamp")?;
    let price_idx = column("price")?;

    let mut points = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| DataError::CsvError(format!("{source}: row {row}: {e}")))?;

        let raw_ts = record.get(ts_idx).unwrap_or("");
        let timestamp = parse_timestamp(raw_ts)
            .ok_or_else(|| malformed(row, "timestamp", format!("unparseable timestamp '{raw_ts}'")))?;

        let raw_price = record.get(price_idx).unwrap_or("");
        let price = raw_price
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
            .ok_or_else(|| malformed(row, "price", format!("non-numeric price '{raw_price}'")))?;

        points.push(RawPoint::new(timestamp, price));
    }

    Ok(AssetSeries::new(asset_id, points))
}

/// Write a raw series as `{dir}/{asset}_{days}d.csv` (tmp file, then rename).
pub fn write_raw_series(dir: &Path, series: &AssetSeries, days: u32) -> Result<PathBuf, DataError> {
    fs::create_dir_all(dir).map_err(|e| DataError::io(dir, e))?;
    let path = dir.join(raw_file_name(&series.asset_id, days));
    let tmp_path = path.with_extension("csv.tmp");

    let mut wtr = csv::Writer::from_path(&tmp_path)
        .map_err(|e| DataError::CsvError(format!("{}: {e}", tmp_path.display())))?;
    let csv_err = |e: csv::Error| DataError::CsvError(format!("{}: {e}", tmp_path.display()));
    wtr.write_record(["timestamp", "price"]).map_err(csv_err)?;
    for p in &series.points {
        wtr.write_record([format_timestamp(&p.timestamp), p.price.to_string()])
            .map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| DataError::io(&tmp_path, e))?;
    drop(wtr);

    fs::rename(&tmp_path, &path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::io(&path, e)
    })?;
    Ok(path)
}
