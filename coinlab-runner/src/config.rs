//! Pipeline configuration loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! window_sizes = [7, 14, 30, 90, 180, 365]
//! assets = ["bitcoin", "ethereum"]   # empty = discover *_{days}d.csv in raw_dir
//! raw_dir = "data/raw"
//! output_dir = "data/processed"
//! allow_partial = true
//! vs_currency = "usd"
//! days = 365
//!
//! [backoff]
//! inter_request_delay = 30.0
//! base_retry_delay = 5.0
//! max_retries = 3
//! ```

use coinlab_core::data::BackoffPolicy;
use coinlab_core::domain::{WindowError, WindowSet, DEFAULT_WINDOWS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid window_sizes: {0}")]
    Windows(#[from] WindowError),

    #[error("days must be at least 1")]
    ZeroDays,

    #[error("vs_currency must not be empty")]
    EmptyCurrency,

    #[error("asset id '{0}' is not usable as a file name prefix")]
    BadAssetId(String),
}

/// Everything a pipeline run needs. Paths are never global; callers pass
/// this value (or pieces of it) explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub window_sizes: Vec<usize>,
    /// Assets to process, in output order. Empty means "every raw file found".
    pub assets: Vec<String>,
    pub raw_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Keep going when some (but not all) assets fail.
    pub allow_partial: bool,
    pub vs_currency: String,
    /// History length, in days, that raw files were downloaded with.
    pub days: u32,
    pub backoff: BackoffPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_sizes: DEFAULT_WINDOWS.to_vec(),
            assets: Vec::new(),
            raw_dir: PathBuf::from("data/raw"),
            output_dir: PathBuf::from("data/processed"),
            allow_partial: true,
            vs_currency: "usd".to_string(),
            days: 365,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// The validated window set. Rejects zero and empty.
    pub fn window_set(&self) -> Result<WindowSet, ConfigError> {
        Ok(WindowSet::new(self.window_sizes.iter().copied())?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window_set()?;
        if self.days == 0 {
            return Err(ConfigError::ZeroDays);
        }
        if self.vs_currency.trim().is_empty() {
            return Err(ConfigError::EmptyCurrency);
        }
        // Asset ids become `{asset}_{days}d.csv`; the id is read back as the
        // stem prefix before the first '_'.
        if let Some(bad) = self
            .assets
            .iter()
            .find(|a| a.is_empty() || a.contains(['_', '/', '\\']))
        {
            return Err(ConfigError::BadAssetId(bad.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.allow_partial);
        assert_eq!(config.window_set().unwrap(), WindowSet::default());
    }

    #[test]
    fn parses_full_file() {
        let config = PipelineConfig::from_toml(
            r#"
            window_sizes = [30, 7]
            assets = ["bitcoin", "solana"]
            raw_dir = "/tmp/raw"
            output_dir = "/tmp/out"
            allow_partial = false
            vs_currency = "eur"
            days = 90

            [backoff]
            inter_request_delay = 1.5
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.window_set().unwrap().as_slice(), &[7, 30]);
        assert_eq!(config.assets, vec!["bitcoin", "solana"]);
        assert_eq!(config.raw_dir, PathBuf::from("/tmp/raw"));
        assert!(!config.allow_partial);
        assert_eq!(config.days, 90);
        assert_eq!(config.backoff.inter_request_delay, Duration::from_millis(1500));
        assert_eq!(config.backoff.max_retries, 5);
        assert_eq!(config.backoff.base_retry_delay, BackoffPolicy::default().base_retry_delay);
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = PipelineConfig::from_toml("window_sizes = [7, 0]").unwrap_err();
        assert!(matches!(err, ConfigError::Windows(WindowError::ZeroWindow(0))));
    }

    #[test]
    fn empty_windows_are_rejected() {
        let err = PipelineConfig::from_toml("window_sizes = []").unwrap_err();
        assert!(matches!(err, ConfigError::Windows(WindowError::Empty)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml("windows = [7]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn underscore_in_asset_id_is_rejected() {
        let err = PipelineConfig::from_toml(r#"assets = ["wrapped_bitcoin"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::BadAssetId(a) if a == "wrapped_bitcoin"));
    }

    #[test]
    fn toml_round_trip() {
        let config = PipelineConfig {
            assets: vec!["bitcoin".into()],
            ..Default::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn from_file_reports_path() {
        let err = PipelineConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
