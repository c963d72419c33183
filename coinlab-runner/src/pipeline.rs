//! The processing pipeline: extract → transform → aggregate → load.
//!
//! Each stage is a method with explicit inputs and outputs. `run` composes
//! them and records a `StageOutcome` per stage in the returned report.
//! A failed transform or aggregate stage skips load, so the canonical store
//! on disk is never replaced by a partial result the config did not allow.
//!
//! Setup problems (unreadable raw directory, no input at all) are returned
//! as `PipelineError`; per-asset problems land in the `BatchReport`.

use std::fmt;
use std::path::PathBuf;

use coinlab_core::data::raw::{asset_id_from_path, raw_file_name};
use coinlab_core::data::{discover_raw_files, read_raw_series, CanonicalStore, DataError, StoreMeta};
use coinlab_core::{
    AggregateError, AssetSeries, CanonicalTable, DatasetAggregator, SeriesTransformer,
    TransformedSeries, WindowSet,
};
use serde::Serialize;
use thiserror::Error;

use crate::batch::{transform_all, BatchReport};
use crate::config::{ConfigError, PipelineConfig};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("no raw series matching *_{days}d.csv in {dir}")]
    NoInput { dir: String, days: u32 },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Transform,
    Aggregate,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Aggregate => "aggregate",
            Stage::Load => "load",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    /// Finished, but `failed` assets were dropped.
    Partial { failed: usize },
    Failed { reason: String },
    /// Not run because an earlier stage failed.
    Skipped,
}

impl StageOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. } | StageOutcome::Skipped)
    }
}

/// Output of the extract stage: series that were read, plus per-asset failures.
#[derive(Debug, Default)]
pub struct Extracted {
    pub series: Vec<AssetSeries>,
    pub report: BatchReport,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub stages: Vec<(Stage, StageOutcome)>,
    pub batch: BatchReport,
    /// The aggregated table, when aggregation ran.
    pub table: Option<CanonicalTable>,
    /// Metadata of what load wrote, when load ran.
    pub meta: Option<StoreMeta>,
}

impl PipelineReport {
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages.iter().find(|(s, _)| *s == stage).map(|(_, o)| o)
    }

    /// True when load completed.
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome(Stage::Load), Some(StageOutcome::Completed))
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    windows: WindowSet,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let windows = config.window_set()?;
        Ok(Self { config, windows })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn windows(&self) -> &WindowSet {
        &self.windows
    }

    pub fn store(&self) -> CanonicalStore {
        CanonicalStore::new(&self.config.output_dir)
    }

    /// Run every stage on the raw files under `raw_dir`.
    pub fn run(&self) -> Result<PipelineReport, PipelineError> {
        let extracted = self.extract()?;
        Ok(self.run_from(extracted))
    }

    /// Run transform, aggregate and load on series supplied in memory.
    pub fn run_series(&self, series: Vec<AssetSeries>) -> PipelineReport {
        self.run_from(Extracted {
            series,
            report: BatchReport::default(),
        })
    }

    /// Read raw series: the configured asset list, or every `*_{days}d.csv`.
    pub fn extract(&self) -> Result<Extracted, PipelineError> {
        let raw_dir = &self.config.raw_dir;
        let days = self.config.days;

        let paths: Vec<(String, PathBuf)> = if self.config.assets.is_empty() {
            let found = discover_raw_files(raw_dir, days)?;
            if found.is_empty() {
                return Err(PipelineError::NoInput {
                    dir: raw_dir.display().to_string(),
                    days,
                });
            }
            found
                .into_iter()
                .map(|p| {
                    let id = asset_id_from_path(&p).unwrap_or_else(|| p.display().to_string());
                    (id, p)
                })
                .collect()
        } else {
            self.config
                .assets
                .iter()
                .map(|a| (a.clone(), raw_dir.join(raw_file_name(a, days))))
                .collect()
        };

        let mut extracted = Extracted::default();
        for (asset_id, path) in paths {
            if !path.is_file() {
                log::warn!("{asset_id}: no raw file at {}", path.display());
                extracted.report.record_failure(
                    asset_id.clone(),
                    DataError::NoRawData {
                        asset_id,
                        dir: raw_dir.display().to_string(),
                    },
                );
                continue;
            }
            match read_raw_series(&path) {
                Ok(series) => {
                    log::debug!("read {} points for {asset_id}", series.len());
                    extracted.series.push(series);
                }
                Err(e) => {
                    log::warn!("{asset_id}: {e}");
                    extracted.report.record_failure(asset_id, e);
                }
            }
        }
        Ok(extracted)
    }

    /// Transform in parallel. Failures are appended to `report`.
    pub fn transform(&self, series: &[AssetSeries], report: &mut BatchReport) -> Vec<TransformedSeries> {
        transform_all(&SeriesTransformer::new(self.windows.clone()), series, report)
    }

    pub fn aggregate(&self, transformed: Vec<TransformedSeries>) -> Result<CanonicalTable, AggregateError> {
        DatasetAggregator.aggregate(transformed)
    }

    pub fn load(&self, table: &CanonicalTable) -> Result<StoreMeta, DataError> {
        self.store().write(table)
    }

    fn run_from(&self, extracted: Extracted) -> PipelineReport {
        let Extracted { series, mut report } = extracted;
        let mut stages = Vec::with_capacity(4);

        let read_failures = report.failed.len();
        stages.push((Stage::Extract, extract_outcome(series.len(), read_failures)));

        let transformed = self.transform(&series, &mut report);
        let transform_failures = report.failed.len() - read_failures;
        let transform_outcome = if report.none_succeeded() {
            StageOutcome::Failed {
                reason: format!("all {} assets failed", report.total()),
            }
        } else if !report.all_succeeded() && !self.config.allow_partial {
            StageOutcome::Failed {
                reason: format!(
                    "{} of {} assets failed and allow_partial is false",
                    report.failed.len(),
                    report.total()
                ),
            }
        } else if transform_failures > 0 {
            StageOutcome::Partial {
                failed: transform_failures,
            }
        } else {
            StageOutcome::Completed
        };

        let halted = transform_outcome.is_failure();
        stages.push((Stage::Transform, transform_outcome));
        if halted {
            log::error!("transform stage failed; skipping aggregate and load");
            stages.push((Stage::Aggregate, StageOutcome::Skipped));
            stages.push((Stage::Load, StageOutcome::Skipped));
            return PipelineReport {
                stages,
                batch: report,
                table: None,
                meta: None,
            };
        }

        let table = match self.aggregate(transformed) {
            Ok(table) => {
                log::info!("aggregated {} rows for {} assets", table.len(), report.succeeded.len());
                stages.push((Stage::Aggregate, StageOutcome::Completed));
                table
            }
            Err(e) => {
                log::error!("aggregate stage failed: {e}");
                stages.push((Stage::Aggregate, StageOutcome::Failed { reason: e.to_string() }));
                stages.push((Stage::Load, StageOutcome::Skipped));
                return PipelineReport {
                    stages,
                    batch: report,
                    table: None,
                    meta: None,
                };
            }
        };

        let meta = match self.load(&table) {
            Ok(meta) => {
                log::info!(
                    "wrote {} rows to {} (hash {})",
                    meta.row_count,
                    self.config.output_dir.display(),
                    meta.data_hash
                );
                stages.push((Stage::Load, StageOutcome::Completed));
                Some(meta)
            }
            Err(e) => {
                log::error!("load stage failed: {e}");
                stages.push((Stage::Load, StageOutcome::Failed { reason: e.to_string() }));
                None
            }
        };

        PipelineReport {
            stages,
            batch: report,
            table: Some(table),
            meta,
        }
    }
}

/// Extract outcome. The allow_partial gate is applied after transform.
fn extract_outcome(read: usize, failed: usize) -> StageOutcome {
    match (read, failed) {
        (0, 0) => StageOutcome::Failed {
            reason: "no input series".into(),
        },
        (0, n) => StageOutcome::Failed {
            reason: format!("all {n} assets failed to read"),
        },
        (_, 0) => StageOutcome::Completed,
        (_, n) => StageOutcome::Partial { failed: n },
    }
}
