//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over remote sources (CoinGecko today)
//! so the download orchestrator can be exercised with a mock in tests.

use crate::domain::RawPoint;
use thiserror::Error;

/// Structured error types for data operations.
///
/// Displayable in CLI output and carried in batch reports.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("asset not found: {asset_id}")]
    AssetNotFound { asset_id: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("{path}: malformed input at row {row}, field '{field}': {reason}")]
    MalformedInput {
        path: String,
        row: usize,
        field: String,
        reason: String,
    },

    #[error("no raw series found for '{asset_id}' in {dir}")]
    NoRawData { asset_id: String, dir: String },

    #[error("schema error: {0}")]
    Schema(#[from] crate::schema::SchemaError),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("csv I/O error: {0}")]
    CsvError(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Trait for remote price sources.
///
/// Providers only fetch; writing raw files is the orchestrator's job.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Ids of the top `n` assets by market cap.
    fn top_assets(&self, n: usize) -> Result<Vec<String>, DataError>;

    /// Daily price history for one asset over the trailing `days`.
    fn price_history(&self, asset_id: &str, days: u32) -> Result<Vec<RawPoint>, DataError>;

    /// Check if the provider is currently available (not blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-asset operations.
pub trait DownloadProgress: Send {
    /// Called when starting to fetch an asset.
    fn on_start(&self, asset_id: &str, index: usize, total: usize);

    /// Called when an asset fetch completes.
    fn on_complete(&self, asset_id: &str, index: usize, total: usize, result: &Result<(), DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that writes through the `log` facade.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_start(&self, asset_id: &str, index: usize, total: usize) {
        log::info!("[{}/{}] fetching {asset_id}", index + 1, total);
    }

    fn on_complete(&self, asset_id: &str, _index: usize, _total: usize, result: &Result<(), DataError>) {
        match result {
            Ok(()) => log::info!("  ok: {asset_id}"),
            Err(e) => log::warn!("  failed: {asset_id}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        log::info!("download complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}
