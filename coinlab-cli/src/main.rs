//! coinlab CLI: download, run, correlate and summary commands.
//!
//! Commands:
//! - `download`: fetch daily price history from CoinGecko into raw CSV files
//! - `run`: extract → transform → aggregate → load into the canonical store
//! - `correlate`: daily-return correlation matrix of the canonical table
//! - `summary`: per-asset dashboard KPIs for one window
//!
//! Every command reads the optional `--config` TOML first; flags override it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use coinlab_core::data::{
    download_assets, CanonicalStore, CircuitBreaker, CoinGeckoProvider, LogProgress,
    PriceProvider, StoreFormat,
};
use coinlab_core::{Correlation, CorrelationEngine, WindowSet};
use coinlab_runner::{
    export_summary_csv, save_correlation_csv, summarize, Pipeline, PipelineConfig, PipelineReport,
    SyntheticGenerator,
};

#[derive(Parser)]
#[command(name = "coinlab", about = "coinlab: crypto price feature engineering and correlation")]
struct Cli {
    /// Pipeline config (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily prices from CoinGecko and write {asset}_{days}d.csv files.
    Download {
        /// Coin ids (e.g. bitcoin ethereum). Defaults to the config asset list, then --top.
        assets: Vec<String>,

        /// Number of top coins by market cap when no assets are given.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Days of history.
        #[arg(long)]
        days: Option<u32>,

        /// Quote currency.
        #[arg(long)]
        vs_currency: Option<String>,

        /// Raw file directory.
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// Do not wait between requests (for mirrors without rate limits).
        #[arg(long, default_value_t = false)]
        no_delay: bool,
    },
    /// Run the processing pipeline and write the canonical table.
    Run {
        /// Raw file directory.
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// Output directory for all_coins.csv / all_coins.parquet.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Window sizes, comma separated (e.g. 7,30,90).
        #[arg(long, value_delimiter = ',')]
        windows: Option<Vec<usize>>,

        /// Fail the run if any asset fails.
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Use seeded synthetic series instead of raw files.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print (or export) the daily-return correlation matrix.
    Correlate {
        /// Directory holding the canonical table.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Which stored format to read.
        #[arg(long, value_enum, default_value_t = Format::Parquet)]
        format: Format,

        /// Write the matrix as CSV to this path.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Print per-asset KPIs for one window.
    Summary {
        /// Window whose volatility is averaged.
        #[arg(long, default_value_t = 30)]
        window: usize,

        /// Directory holding the canonical table.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Which stored format to read.
        #[arg(long, value_enum, default_value_t = Format::Parquet)]
        format: Format,

        /// Write the summary as CSV to this path.
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Parquet,
}

impl From<Format> for StoreFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Csv => StoreFormat::Csv,
            Format::Parquet => StoreFormat::Parquet,
        }
    }
}

const SYNTHETIC_ASSETS: [&str; 3] = ["alpha", "beta", "gamma"];

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Download {
            assets,
            top,
            days,
            vs_currency,
            raw_dir,
            no_delay,
        } => {
            override_opt(&mut config.days, days);
            override_opt(&mut config.vs_currency, vs_currency);
            override_opt(&mut config.raw_dir, raw_dir);
            if !assets.is_empty() {
                config.assets = assets;
            }
            if no_delay {
                config.backoff.inter_request_delay = std::time::Duration::ZERO;
            }
            config.validate()?;
            run_download(&config, top)
        }
        Commands::Run {
            raw_dir,
            output_dir,
            windows,
            strict,
            synthetic,
            seed,
        } => {
            override_opt(&mut config.raw_dir, raw_dir);
            override_opt(&mut config.output_dir, output_dir);
            override_opt(&mut config.window_sizes, windows);
            if strict {
                config.allow_partial = false;
            }
            run_pipeline(config, synthetic.then_some(seed))
        }
        Commands::Correlate {
            output_dir,
            format,
            export,
        } => {
            override_opt(&mut config.output_dir, output_dir);
            run_correlate(&config.output_dir, format.into(), export.as_deref())
        }
        Commands::Summary {
            window,
            output_dir,
            format,
            export,
        } => {
            override_opt(&mut config.output_dir, output_dir);
            run_summary(&config.output_dir, format.into(), window, export.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::from_file(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn override_opt<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn run_download(config: &PipelineConfig, top: usize) -> Result<()> {
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = CoinGeckoProvider::new(breaker, config.backoff, config.vs_currency.clone())?;

    let assets = if config.assets.is_empty() {
        log::info!("fetching top {top} coins by market cap");
        provider.top_assets(top)?
    } else {
        config.assets.clone()
    };
    let asset_refs: Vec<&str> = assets.iter().map(String::as_str).collect();

    let summary = download_assets(
        &provider,
        &config.raw_dir,
        &asset_refs,
        config.days,
        &config.backoff,
        &LogProgress,
    );

    println!(
        "Downloaded {}/{} assets into {}",
        summary.written.len(),
        summary.total,
        config.raw_dir.display()
    );
    if !summary.all_succeeded() {
        for (asset, err) in &summary.errors {
            eprintln!("Error for {asset}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_pipeline(config: PipelineConfig, synthetic_seed: Option<u64>) -> Result<()> {
    let pipeline = Pipeline::new(config)?;

    let report = match synthetic_seed {
        Some(seed) => {
            let assets: Vec<&str> = if pipeline.config().assets.is_empty() {
                SYNTHETIC_ASSETS.to_vec()
            } else {
                pipeline.config().assets.iter().map(String::as_str).collect()
            };
            log::warn!("using synthetic series (seed {seed}); results are not market data");
            let generator = SyntheticGenerator::default()
                .with_seed(seed)
                .with_days(pipeline.config().days as usize);
            pipeline.run_series(generator.generate(&assets))
        }
        None => pipeline.run()?,
    };

    print_report(&report);
    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    for (stage, outcome) in &report.stages {
        println!("{:<10} {}", stage.to_string(), serde_json::to_string(outcome).unwrap_or_default());
    }
    for failure in &report.batch.failed {
        eprintln!("  {}: {}", failure.asset_id, failure.error);
    }
    if let Some(meta) = &report.meta {
        println!(
            "{} rows, {} assets, hash {}",
            meta.row_count,
            meta.assets.len(),
            meta.data_hash
        );
    }
}

/// Read the table using the window set recorded when it was written.
fn read_table(output_dir: &Path, format: StoreFormat) -> Result<coinlab_core::CanonicalTable> {
    let store = CanonicalStore::new(output_dir);
    let windows: WindowSet = store
        .read_meta()
        .map(|m| m.windows)
        .with_context(|| format!("no canonical table in {} (run `coinlab run` first)", output_dir.display()))?;
    Ok(store.read(format, &windows)?)
}

fn run_correlate(output_dir: &Path, format: StoreFormat, export: Option<&Path>) -> Result<()> {
    let table = read_table(output_dir, format)?;
    let matrix = match CorrelationEngine.correlate(&table)? {
        Correlation::Matrix(m) => m,
        Correlation::InsufficientData(reason) => {
            log::warn!("not enough data to correlate: {reason:?}");
            println!("Insufficient data for correlation: {reason:?}");
            return Ok(());
        }
    };

    println!("Aligned rows: {}", matrix.aligned_rows);
    print!("{:<14}", "");
    for asset in &matrix.assets {
        print!("{asset:>14}");
    }
    println!();
    for (asset, row) in matrix.assets.iter().zip(&matrix.values) {
        print!("{asset:<14}");
        for v in row {
            print!("{v:>14.4}");
        }
        println!();
    }

    if let Some(path) = export {
        save_correlation_csv(&matrix, path)?;
        println!("Correlation matrix saved to: {}", path.display());
    }
    Ok(())
}

fn run_summary(output_dir: &Path, format: StoreFormat, window: usize, export: Option<&Path>) -> Result<()> {
    let table = read_table(output_dir, format)?;
    let summaries = summarize(&table, window)?;

    println!(
        "{:<14} {:>6} {:>14} {:>12} {:>12} {:>12}",
        "Asset", "Rows", "Last price", "Return", "Max DD", format!("Vol {window}d")
    );
    println!("{}", "-".repeat(75));
    for s in &summaries {
        let vol = s
            .mean_volatility
            .map(|v| format!("{v:.4}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<14} {:>6} {:>14.4} {:>11.2}% {:>11.2}% {:>12}{}",
            s.asset_id,
            s.rows,
            s.last_price,
            s.total_return * 100.0,
            s.max_drawdown * 100.0,
            vol,
            if s.insufficient { "  (insufficient data)" } else { "" }
        );
    }

    if let Some(path) = export {
        std::fs::write(path, export_summary_csv(&summaries)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Summary saved to: {}", path.display());
    }
    Ok(())
}
