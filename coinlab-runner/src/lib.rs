//! coinlab runner: pipeline orchestration on top of `coinlab-core`.
//!
//! This crate provides:
//! - TOML pipeline configuration
//! - The extract → transform → aggregate → load pipeline with per-stage outcomes
//! - Parallel per-asset transform with a failure report
//! - Dashboard KPI summaries
//! - Seeded synthetic price series
//! - CSV export of correlation matrices and summaries

pub mod batch;
pub mod config;
pub mod export;
pub mod pipeline;
pub mod summary;
pub mod synthetic;

pub use batch::{transform_all, AssetError, AssetFailure, BatchReport};
pub use config::{ConfigError, PipelineConfig};
pub use export::{export_correlation_csv, export_summary_csv, save_correlation_csv};
pub use pipeline::{Pipeline, PipelineError, PipelineReport, Stage, StageOutcome};
pub use summary::{summarize, AssetSummary, SummaryError, MIN_ROWS_FOR_KPIS};
pub use synthetic::SyntheticGenerator;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }

    #[test]
    fn pipeline_is_send_sync() {
        assert_send::<Pipeline>();
        assert_sync::<Pipeline>();
    }

    #[test]
    fn reports_are_send() {
        assert_send::<PipelineReport>();
        assert_send::<BatchReport>();
        assert_send::<AssetSummary>();
    }
}
