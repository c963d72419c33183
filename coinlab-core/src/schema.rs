//! Canonical output schema.
//!
//! Column names are derived from the window set here and nowhere else.
//! Order: timestamp, coin, price, pct_change, ma_*, volatility_*,
//! cumulative_return, return_from_start, daily_return, drawdown.

use crate::domain::WindowSet;
use polars::prelude::*;

pub const TIMESTAMP: &str = "timestamp";
pub const COIN: &str = "coin";
pub const PRICE: &str = "price";
pub const PCT_CHANGE: &str = "pct_change";
pub const CUMULATIVE_RETURN: &str = "cumulative_return";
pub const RETURN_FROM_START: &str = "return_from_start";
pub const DAILY_RETURN: &str = "daily_return";
pub const DRAWDOWN: &str = "drawdown";

pub fn ma_column(window: usize) -> String {
    format!("ma_{window}d")
}

pub fn volatility_column(window: usize) -> String {
    format!("volatility_{window}d")
}

/// Expected schema for the canonical multi-asset table.
pub struct CanonicalSchema;

impl CanonicalSchema {
    /// Column names in output order.
    pub fn column_names(windows: &WindowSet) -> Vec<String> {
        let mut names = vec![
            TIMESTAMP.to_string(),
            COIN.to_string(),
            PRICE.to_string(),
            PCT_CHANGE.to_string(),
        ];
        names.extend(windows.iter().map(ma_column));
        names.extend(windows.iter().map(volatility_column));
        names.extend(
            [CUMULATIVE_RETURN, RETURN_FROM_START, DAILY_RETURN, DRAWDOWN]
                .iter()
                .map(|s| s.to_string()),
        );
        names
    }

    /// Polars schema used for the Parquet representation.
    pub fn schema(windows: &WindowSet) -> Schema {
        Schema::from_iter(Self::column_names(windows).into_iter().map(|name| {
            let dtype = match name.as_str() {
                TIMESTAMP => DataType::Datetime(TimeUnit::Milliseconds, None),
                COIN => DataType::String,
                _ => DataType::Float64,
            };
            Field::new(name.into(), dtype)
        }))
    }

    /// Validate a DataFrame against the schema.
    pub fn validate(df: &DataFrame, windows: &WindowSet) -> Result<(), SchemaError> {
        let expected = Self::schema(windows);
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows() -> WindowSet {
        WindowSet::new([7, 30]).unwrap()
    }

    #[test]
    fn column_order_matches_output_contract() {
        assert_eq!(
            CanonicalSchema::column_names(&windows()),
            vec![
                "timestamp",
                "coin",
                "price",
                "pct_change",
                "ma_7d",
                "ma_30d",
                "volatility_7d",
                "volatility_30d",
                "cumulative_return",
                "return_from_start",
                "daily_return",
                "drawdown",
            ]
        );
    }

    #[test]
    fn default_windows_give_twenty_columns() {
        assert_eq!(CanonicalSchema::column_names(&WindowSet::default()).len(), 20);
    }

    #[test]
    fn test_validate_rejects_missing_column() {
        let timestamp = Series::new("timestamp".into(), &[1672531200000i64])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();

        let df = DataFrame::new(vec![
            Column::Series(timestamp.into()),
            Column::Series(Series::new("coin".into(), &["bitcoin"]).into()),
            Column::Series(Series::new("price".into(), &[400.0]).into()),
        ])
        .unwrap();

        let result = CanonicalSchema::validate(&df, &windows());
        assert!(matches!(result.unwrap_err(), SchemaError::MissingColumn(c) if c == "pct_change"));
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let timestamp = Series::new("timestamp".into(), &[1672531200000i64])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();

        let mut columns = vec![
            Column::Series(timestamp.into()),
            Column::Series(Series::new("coin".into(), &["bitcoin"]).into()),
            Column::Series(Series::new("price".into(), &["not_a_number"]).into()),
        ];
        for name in CanonicalSchema::column_names(&windows()).into_iter().skip(3) {
            columns.push(Column::Series(Series::new(name.into(), &[0.0]).into()));
        }
        let df = DataFrame::new(columns).unwrap();

        let result = CanonicalSchema::validate(&df, &windows());
        assert!(matches!(result.unwrap_err(), SchemaError::TypeMismatch { column, .. } if column == "price"));
    }
}
