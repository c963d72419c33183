//! Data acquisition and persistence adapters.
//!
//! Everything here is I/O plumbing around the pure feature-engineering core:
//! raw per-asset CSV files in, the canonical table out.

pub mod backoff;
pub mod circuit_breaker;
pub mod coingecko;
pub mod download;
pub mod provider;
pub mod raw;
pub mod store;
pub mod timestamp;

pub use backoff::BackoffPolicy;
pub use circuit_breaker::CircuitBreaker;
pub use coingecko::CoinGeckoProvider;
pub use download::{download_assets, DownloadSummary};
pub use provider::{DataError, DownloadProgress, LogProgress, PriceProvider};
pub use raw::{discover_raw_files, read_raw_series, write_raw_series};
pub use store::{content_hash, CanonicalStore, StoreFormat, StoreMeta};
