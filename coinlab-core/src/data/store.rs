//! Canonical table persistence: CSV + Parquet + metadata sidecar.
//!
//! Layout:
//! - `{output_dir}/all_coins.csv`
//! - `{output_dir}/all_coins.parquet`
//! - `{output_dir}/all_coins.meta.json` (row count, assets, windows, content hash)
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Both formats hold identical content; `content_hash` is computed from the
//!   in-memory table and stored in the sidecar so either file can be checked
//! - Schema validation on load

use super::provider::DataError;
use super::timestamp::{format_timestamp, from_epoch_millis, parse_timestamp, to_epoch_millis};
use crate::domain::{CanonicalRow, CanonicalTable, FeatureRow, WindowSet, WindowStats};
use crate::schema::{self, CanonicalSchema};
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const CANONICAL_STEM: &str = "all_coins";

/// Metadata sidecar for a written canonical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub row_count: usize,
    pub assets: Vec<String>,
    pub windows: WindowSet,
    pub data_hash: String,
    pub written_at: NaiveDateTime,
}

/// Which on-disk representation to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreFormat {
    Csv,
    Parquet,
}

/// Reads and writes the canonical table under one output directory.
pub struct CanonicalStore {
    output_dir: PathBuf,
}

impl CanonicalStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join(format!("{CANONICAL_STEM}.csv"))
    }

    pub fn parquet_path(&self) -> PathBuf {
        self.output_dir.join(format!("{CANONICAL_STEM}.parquet"))
    }

    pub fn meta_path(&self) -> PathBuf {
        self.output_dir.join(format!("{CANONICAL_STEM}.meta.json"))
    }

    /// Write both formats and the sidecar. Returns the sidecar contents.
    pub fn write(&self, table: &CanonicalTable) -> Result<StoreMeta, DataError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| DataError::io(&self.output_dir, e))?;

        let csv_path = self.csv_path();
        atomic_write(&csv_path, |file| write_csv(table, file))?;
        log::info!("wrote {} rows to {}", table.len(), csv_path.display());

        let parquet_path = self.parquet_path();
        let mut df = table_to_dataframe(table)?;
        atomic_write(&parquet_path, |file| {
            ParquetWriter::new(file)
                .finish(&mut df)
                .map(|_| ())
                .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))
        })?;
        log::info!("wrote {} rows to {}", table.len(), parquet_path.display());

        let meta = StoreMeta {
            row_count: table.len(),
            assets: table.assets().into_iter().map(String::from).collect(),
            windows: table.windows.clone(),
            data_hash: content_hash(table),
            written_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Other(format!("meta serialization: {e}")))?;
        atomic_write(&self.meta_path(), |file| {
            file.write_all(meta_json.as_bytes())
                .map_err(|e| DataError::io(&self.meta_path(), e))
        })?;

        Ok(meta)
    }

    pub fn read(&self, format: StoreFormat, windows: &WindowSet) -> Result<CanonicalTable, DataError> {
        match format {
            StoreFormat::Csv => self.read_csv(windows),
            StoreFormat::Parquet => self.read_parquet(windows),
        }
    }

    pub fn read_csv(&self, windows: &WindowSet) -> Result<CanonicalTable, DataError> {
        let path = self.csv_path();
        let file = fs::File::open(&path).map_err(|e| DataError::io(&path, e))?;
        read_csv(file, windows, &path.display().to_string())
    }

    pub fn read_parquet(&self, windows: &WindowSet) -> Result<CanonicalTable, DataError> {
        let path = self.parquet_path();
        let file = fs::File::open(&path).map_err(|e| DataError::io(&path, e))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| DataError::ParquetError(format!("read {}: {e}", path.display())))?;
        dataframe_to_table(&df, windows)
    }

    pub fn read_meta(&self) -> Result<StoreMeta, DataError> {
        let path = self.meta_path();
        let content = fs::read_to_string(&path).map_err(|e| DataError::io(&path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| DataError::Other(format!("meta parse {}: {e}", path.display())))
    }
}

/// Write through a `.tmp` sibling and rename into place.
fn atomic_write<F>(path: &Path, write: F) -> Result<(), DataError>
where
    F: FnOnce(&mut fs::File) -> Result<(), DataError>,
{
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("out")
    ));
    let mut file = fs::File::create(&tmp_path).map_err(|e| DataError::io(&tmp_path, e))?;
    if let Err(e) = write(&mut file).and_then(|_| file.sync_all().map_err(|e| DataError::io(&tmp_path, e))) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::io(path, e)
    })
}

/// BLAKE3 over every row: asset id, timestamp and the bit pattern of each value.
///
/// Missing values hash differently from NaN, so the hash distinguishes the two.
pub fn content_hash(table: &CanonicalTable) -> String {
    let mut hasher = blake3::Hasher::new();
    for w in table.windows.iter() {
        hasher.update(&(w as u64).to_le_bytes());
    }
    for row in &table.rows {
        let f = &row.features;
        hasher.update(row.asset_id.as_bytes());
        hasher.update(&[0]);
        hasher.update(&to_epoch_millis(&f.timestamp).to_le_bytes());
        hash_value(&mut hasher, Some(f.price));
        hash_value(&mut hasher, f.pct_change);
        for w in &f.windows {
            hash_value(&mut hasher, w.ma);
        }
        for w in &f.windows {
            hash_value(&mut hasher, w.volatility);
        }
        hash_value(&mut hasher, Some(f.cumulative_return));
        hash_value(&mut hasher, Some(f.return_from_start));
        hash_value(&mut hasher, f.daily_return);
        hash_value(&mut hasher, Some(f.drawdown));
    }
    hasher.finalize().to_hex().to_string()
}

fn hash_value(hasher: &mut blake3::Hasher, value: Option<f64>) {
    match value {
        None => hasher.update(&[0]),
        // Collapse NaN payloads so formats that rewrite them still agree
        Some(v) if v.is_nan() => hasher.update(&[2]),
        Some(v) => hasher.update(&[1]).update(&v.to_bits().to_le_bytes()),
    };
}

// ── CSV ─────────────────────────────────────────────────────────────

/// Missing values are written as empty fields; NaN as `NaN`.
pub fn write_csv<W: Write>(table: &CanonicalTable, writer: W) -> Result<(), DataError> {
    let csv_err = |e: csv::Error| DataError::CsvError(format!("write: {e}"));
    let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CanonicalSchema::column_names(&table.windows))
        .map_err(csv_err)?;

    for row in &table.rows {
        let f = &row.features;
        let mut record = Vec::with_capacity(8 + 2 * f.windows.len());
        record.push(format_timestamp(&f.timestamp));
        record.push(row.asset_id.clone());
        record.push(f.price.to_string());
        record.push(opt(f.pct_change));
        record.extend(f.windows.iter().map(|w| opt(w.ma)));
        record.extend(f.windows.iter().map(|w| opt(w.volatility)));
        record.push(f.cumulative_return.to_string());
        record.push(f.return_from_start.to_string());
        record.push(opt(f.daily_return));
        record.push(f.drawdown.to_string());
        wtr.write_record(&record).map_err(csv_err)?;
    }

    wtr.flush().map_err(|e| DataError::CsvError(format!("flush: {e}")))
}

pub fn read_csv<R: Read>(reader: R, windows: &WindowSet, source: &str) -> Result<CanonicalTable, DataError> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| DataError::CsvError(format!("{source}: header: {e}")))?
        .clone();

    let index = |name: &str| -> Result<usize, DataError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| schema::SchemaError::MissingColumn(name.to_string()).into())
    };
    let ts_idx = index(schema::TIMESTAMP)?;
    let coin_idx = index(schema::COIN)?;
    let price_idx = index(schema::PRICE)?;
    let pct_idx = index(schema::PCT_CHANGE)?;
    let ma_idx: Vec<usize> = windows
        .iter()
        .map(|w| index(&schema::ma_column(w)))
        .collect::<Result<_, _>>()?;
    let vol_idx: Vec<usize> = windows
        .iter()
        .map(|w| index(&schema::volatility_column(w)))
        .collect::<Result<_, _>>()?;
    let cum_idx = index(schema::CUMULATIVE_RETURN)?;
    let rfs_idx = index(schema::RETURN_FROM_START)?;
    let daily_idx = index(schema::DAILY_RETURN)?;
    let dd_idx = index(schema::DRAWDOWN)?;

    let mut rows = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| DataError::CsvError(format!("{source}: row {row}: {e}")))?;
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let malformed = |name: &str, raw: &str| DataError::MalformedInput {
            path: source.to_string(),
            row,
            field: name.to_string(),
            reason: format!("cannot parse '{raw}'"),
        };
        let optional = |idx: usize, name: &str| -> Result<Option<f64>, DataError> {
            let raw = field(idx);
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<f64>().map(Some).map_err(|_| malformed(name, raw))
        };
        let required = |idx: usize, name: &str| -> Result<f64, DataError> {
            optional(idx, name)?.ok_or_else(|| malformed(name, ""))
        };

        let raw_ts = field(ts_idx);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| malformed(schema::TIMESTAMP, raw_ts))?;

        let window_stats = windows
            .iter()
            .zip(ma_idx.iter().zip(&vol_idx))
            .map(|(w, (&mi, &vi))| -> Result<WindowStats, DataError> {
                Ok(WindowStats {
                    window: w,
                    ma: optional(mi, &schema::ma_column(w))?,
                    volatility: optional(vi, &schema::volatility_column(w))?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        rows.push(CanonicalRow {
            asset_id: field(coin_idx).to_string(),
            features: FeatureRow {
                timestamp,
                price: required(price_idx, schema::PRICE)?,
                pct_change: optional(pct_idx, schema::PCT_CHANGE)?,
                windows: window_stats,
                cumulative_return: required(cum_idx, schema::CUMULATIVE_RETURN)?,
                return_from_start: required(rfs_idx, schema::RETURN_FROM_START)?,
                daily_return: optional(daily_idx, schema::DAILY_RETURN)?,
                drawdown: required(dd_idx, schema::DRAWDOWN)?,
            },
        });
    }

    Ok(CanonicalTable {
        windows: windows.clone(),
        rows,
    })
}

// ── Parquet / DataFrame ─────────────────────────────────────────────

/// Convert the canonical table to a Polars DataFrame matching `CanonicalSchema`.
pub fn table_to_dataframe(table: &CanonicalTable) -> Result<DataFrame, DataError> {
    let rows = &table.rows;
    let f64_col = |name: &str, values: Vec<f64>| Column::new(name.into(), values);
    let opt_col = |name: &str, values: Vec<Option<f64>>| Column::new(name.into(), values);

    let timestamps: Vec<i64> = rows.iter().map(|r| to_epoch_millis(&r.features.timestamp)).collect();
    let coins: Vec<&str> = rows.iter().map(|r| r.asset_id.as_str()).collect();

    let mut columns = vec![
        Column::new(schema::TIMESTAMP.into(), timestamps)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .map_err(|e| DataError::ParquetError(format!("timestamp cast: {e}")))?,
        Column::new(schema::COIN.into(), coins),
        f64_col(schema::PRICE, rows.iter().map(|r| r.features.price).collect()),
        opt_col(schema::PCT_CHANGE, rows.iter().map(|r| r.features.pct_change).collect()),
    ];
    for w in table.windows.iter() {
        columns.push(opt_col(&schema::ma_column(w), rows.iter().map(|r| r.features.ma(w)).collect()));
    }
    for w in table.windows.iter() {
        columns.push(opt_col(
            &schema::volatility_column(w),
            rows.iter().map(|r| r.features.volatility(w)).collect(),
        ));
    }
    columns.push(f64_col(
        schema::CUMULATIVE_RETURN,
        rows.iter().map(|r| r.features.cumulative_return).collect(),
    ));
    columns.push(f64_col(
        schema::RETURN_FROM_START,
        rows.iter().map(|r| r.features.return_from_start).collect(),
    ));
    columns.push(opt_col(schema::DAILY_RETURN, rows.iter().map(|r| r.features.daily_return).collect()));
    columns.push(f64_col(schema::DRAWDOWN, rows.iter().map(|r| r.features.drawdown).collect()));

    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

/// Convert a validated DataFrame back into the canonical table.
pub fn dataframe_to_table(df: &DataFrame, windows: &WindowSet) -> Result<CanonicalTable, DataError> {
    CanonicalSchema::validate(df, windows)?;

    let map_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));
    let float = |name: &str| -> Result<Float64Chunked, DataError> {
        Ok(df.column(name).map_err(map_err)?.f64().map_err(map_err)?.clone())
    };
    let null_at = |name: &str, row: usize| DataError::MalformedInput {
        path: "parquet".into(),
        row,
        field: name.to_string(),
        reason: "unexpected null".into(),
    };

    let ts_col = df
        .column(schema::TIMESTAMP)
        .map_err(map_err)?
        .cast(&DataType::Int64)
        .map_err(map_err)?;
    let ts_ca = ts_col.i64().map_err(map_err)?;
    let coin_ca = df.column(schema::COIN).map_err(map_err)?.str().map_err(map_err)?;
    let price_ca = float(schema::PRICE)?;
    let pct_ca = float(schema::PCT_CHANGE)?;
    let ma_ca: Vec<Float64Chunked> = windows
        .iter()
        .map(|w| float(&schema::ma_column(w)))
        .collect::<Result<_, _>>()?;
    let vol_ca: Vec<Float64Chunked> = windows
        .iter()
        .map(|w| float(&schema::volatility_column(w)))
        .collect::<Result<_, _>>()?;
    let cum_ca = float(schema::CUMULATIVE_RETURN)?;
    let rfs_ca = float(schema::RETURN_FROM_START)?;
    let daily_ca = float(schema::DAILY_RETURN)?;
    let dd_ca = float(schema::DRAWDOWN)?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let millis = ts_ca.get(i).ok_or_else(|| null_at(schema::TIMESTAMP, i))?;
        let timestamp = from_epoch_millis(millis).ok_or_else(|| null_at(schema::TIMESTAMP, i))?;
        let required = |ca: &Float64Chunked, name: &str| ca.get(i).ok_or_else(|| null_at(name, i));

        rows.push(CanonicalRow {
            asset_id: coin_ca.get(i).ok_or_else(|| null_at(schema::COIN, i))?.to_string(),
            features: FeatureRow {
                timestamp,
                price: required(&price_ca, schema::PRICE)?,
                pct_change: pct_ca.get(i),
                windows: windows
                    .iter()
                    .enumerate()
                    .map(|(k, w)| WindowStats {
                        window: w,
                        ma: ma_ca[k].get(i),
                        volatility: vol_ca[k].get(i),
                    })
                    .collect(),
                cumulative_return: required(&cum_ca, schema::CUMULATIVE_RETURN)?,
                return_from_start: required(&rfs_ca, schema::RETURN_FROM_START)?,
                daily_return: daily_ca.get(i),
                drawdown: required(&dd_ca, schema::DRAWDOWN)?,
            },
        });
    }

    Ok(CanonicalTable {
        windows: windows.clone(),
        rows,
    })
}
