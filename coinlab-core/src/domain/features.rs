//! Derived feature rows and the canonical multi-asset table.

use super::window::WindowSet;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Moving average and sample volatility for one trailing window.
///
/// Both are `None` until `window` observations are available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub window: usize,
    pub ma: Option<f64>,
    pub volatility: Option<f64>,
}

/// All derived features for one asset at one timestamp.
///
/// `None` means "not yet defined" (warm-up rows). `f64::NAN` inside a value
/// means the computation hit a zero reference price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub pct_change: Option<f64>,
    /// One entry per window, in `WindowSet` order.
    pub windows: Vec<WindowStats>,
    pub cumulative_return: f64,
    pub return_from_start: f64,
    pub daily_return: Option<f64>,
    pub drawdown: f64,
}

impl FeatureRow {
    /// Stats for a specific window size, if it was computed.
    pub fn window(&self, window: usize) -> Option<&WindowStats> {
        self.windows.iter().find(|w| w.window == window)
    }

    pub fn ma(&self, window: usize) -> Option<f64> {
        self.window(window).and_then(|w| w.ma)
    }

    pub fn volatility(&self, window: usize) -> Option<f64> {
        self.window(window).and_then(|w| w.volatility)
    }
}

/// Output of transforming one asset: its id, the windows used, and the rows
/// in ascending timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedSeries {
    pub asset_id: String,
    pub windows: WindowSet,
    pub rows: Vec<FeatureRow>,
}

/// A feature row tagged with its asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub asset_id: String,
    pub features: FeatureRow,
}

/// Union of every asset's feature rows.
///
/// Rows are in aggregation order (asset by asset), not globally time-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTable {
    pub windows: WindowSet,
    pub rows: Vec<CanonicalRow>,
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct asset ids in order of first appearance.
    pub fn assets(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.asset_id.as_str()) {
                seen.push(&row.asset_id);
            }
        }
        seen
    }

    /// Rows belonging to one asset, in table order.
    pub fn rows_for<'a>(&'a self, asset_id: &'a str) -> impl Iterator<Item = &'a FeatureRow> + 'a {
        self.rows
            .iter()
            .filter(move |r| r.asset_id == asset_id)
            .map(|r| &r.features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(day: u32, price: f64) -> FeatureRow {
        FeatureRow {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            price,
            pct_change: None,
            windows: vec![WindowStats {
                window: 7,
                ma: Some(price),
                volatility: None,
            }],
            cumulative_return: 0.0,
            return_from_start: 0.0,
            daily_return: None,
            drawdown: 0.0,
        }
    }

    #[test]
    fn window_lookup() {
        let r = row(1, 10.0);
        assert_eq!(r.ma(7), Some(10.0));
        assert_eq!(r.volatility(7), None);
        assert!(r.window(14).is_none());
    }

    #[test]
    fn assets_in_first_appearance_order() {
        let table = CanonicalTable {
            windows: WindowSet::new([7]).unwrap(),
            rows: vec![
                CanonicalRow { asset_id: "solana".into(), features: row(1, 1.0) },
                CanonicalRow { asset_id: "bitcoin".into(), features: row(1, 2.0) },
                CanonicalRow { asset_id: "solana".into(), features: row(2, 3.0) },
            ],
        };
        assert_eq!(table.assets(), vec!["solana", "bitcoin"]);
        assert_eq!(table.rows_for("solana").count(), 2);
    }
}
