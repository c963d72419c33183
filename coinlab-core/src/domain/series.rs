//! Raw price observations as produced by the acquisition step.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One `(timestamp, price)` observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub timestamp: NaiveDateTime,
    pub price: f64,
}

impl RawPoint {
    pub fn new(timestamp: NaiveDateTime, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// The full raw history for one asset.
///
/// Points are not guaranteed to be sorted or unique; the transformer sorts
/// them and passes duplicates through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    pub asset_id: String,
    pub points: Vec<RawPoint>,
}

impl AssetSeries {
    pub fn new(asset_id: impl Into<String>, points: Vec<RawPoint>) -> Self {
        Self {
            asset_id: asset_id.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn series_len_tracks_points() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let series = AssetSeries::new("bitcoin", vec![RawPoint::new(ts, 1.0)]);
        assert_eq!(series.len(), 1);
        assert!(!series.is_empty());
        assert!(AssetSeries::new("empty", vec![]).is_empty());
    }
}
