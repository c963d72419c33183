//! Download orchestrator: fetch each asset, write its raw file, pace requests.

use super::backoff::BackoffPolicy;
use super::provider::{DataError, DownloadProgress, PriceProvider};
use super::raw::write_raw_series;
use crate::domain::AssetSeries;
use std::path::{Path, PathBuf};

/// Download every asset in order, writing `{raw_dir}/{asset}_{days}d.csv`.
///
/// Failures are collected per asset; a tripped circuit breaker fails the
/// remaining assets without further requests.
pub fn download_assets(
    provider: &dyn PriceProvider,
    raw_dir: &Path,
    assets: &[&str],
    days: u32,
    backoff: &BackoffPolicy,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = assets.len();
    let mut written = Vec::new();
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, asset_id) in assets.iter().enumerate() {
        if i > 0 && !backoff.inter_request_delay.is_zero() {
            log::debug!("waiting {:?} before next request", backoff.inter_request_delay);
            std::thread::sleep(backoff.inter_request_delay);
        }

        progress.on_start(asset_id, i, total);
        let result = download_single(provider, raw_dir, asset_id, days);
        let report = result.as_ref().map(|_| ()).map_err(clone_for_report);
        progress.on_complete(asset_id, i, total, &report);

        match result {
            Ok(path) => written.push(path),
            Err(e) => errors.push((asset_id.to_string(), e)),
        }

        if !provider.is_available() {
            for rest in &assets[(i + 1)..] {
                errors.push((rest.to_string(), DataError::CircuitBreakerTripped));
            }
            break;
        }
    }

    progress.on_batch_complete(written.len(), errors.len(), total);

    DownloadSummary {
        total,
        written,
        errors,
    }
}

fn download_single(
    provider: &dyn PriceProvider,
    raw_dir: &Path,
    asset_id: &str,
    days: u32,
) -> Result<PathBuf, DataError> {
    let points = provider.price_history(asset_id, days)?;
    write_raw_series(raw_dir, &AssetSeries::new(asset_id, points), days)
}

/// `DataError` is not `Clone` (it can wrap `io::Error`); progress only needs the message.
fn clone_for_report(e: &DataError) -> DataError {
    match e {
        DataError::CircuitBreakerTripped => DataError::CircuitBreakerTripped,
        other => DataError::Other(other.to_string()),
    }
}

/// Summary of a batch download.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub written: Vec<PathBuf>,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::LogProgress;
    use crate::domain::RawPoint;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockProvider {
        blocked: AtomicBool,
        block_after: &'static str,
    }

    impl PriceProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn top_assets(&self, n: usize) -> Result<Vec<String>, DataError> {
            Ok(["bitcoin", "ethereum", "solana"].iter().take(n).map(|s| s.to_string()).collect())
        }

        fn price_history(&self, asset_id: &str, _days: u32) -> Result<Vec<RawPoint>, DataError> {
            if asset_id == "ghost" {
                return Err(DataError::AssetNotFound { asset_id: asset_id.into() });
            }
            if asset_id == self.block_after {
                self.blocked.store(true, Ordering::SeqCst);
            }
            let ts = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
            Ok(vec![RawPoint::new(ts, 1.0)])
        }

        fn is_available(&self) -> bool {
            !self.blocked.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn failures_are_collected_per_asset() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider { blocked: AtomicBool::new(false), block_after: "" };
        let summary = download_assets(
            &provider,
            dir.path(),
            &["bitcoin", "ghost", "ethereum"],
            365,
            &BackoffPolicy::none(),
            &LogProgress,
        );

        assert_eq!(summary.total, 3);
        assert_eq!(summary.written.len(), 2);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].0, "ghost");
        assert!(dir.path().join("ethereum_365d.csv").exists());
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn blocked_provider_fails_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider { blocked: AtomicBool::new(false), block_after: "bitcoin" };
        let summary = download_assets(
            &provider,
            dir.path(),
            &["bitcoin", "ethereum", "solana"],
            30,
            &BackoffPolicy::none(),
            &LogProgress,
        );

        assert_eq!(summary.written.len(), 1);
        assert_eq!(summary.errors.len(), 2);
        assert!(summary
            .errors
            .iter()
            .all(|(_, e)| matches!(e, DataError::CircuitBreakerTripped)));
    }
}
