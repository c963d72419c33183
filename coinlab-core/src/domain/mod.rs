//! Domain types for coinlab

pub mod features;
pub mod series;
pub mod window;

pub use features::{CanonicalRow, CanonicalTable, FeatureRow, TransformedSeries, WindowStats};
pub use series::{AssetSeries, RawPoint};
pub use window::{WindowError, WindowSet, DEFAULT_WINDOWS};

/// Asset identifier (CoinGecko coin id, e.g. `bitcoin`).
pub type AssetId = String;
