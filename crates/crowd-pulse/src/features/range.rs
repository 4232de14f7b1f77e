//! Intraday price range.
//!
//! `range_t = (high_t - low_t) / open_t * 100`, NaN when `open_t == 0`.

use super::{Feature, FeatureKind};
use crate::{AlignedTable, Result};
use polars::prelude::*;

/// Append `output = (high - low) / open * 100` to a copy of `table`.
pub fn intraday_range(table: &AlignedTable, output: &str) -> Result<AlignedTable> {
    for column in ["open", "high", "low"] {
        table.require(column)?;
    }

    let open = col("open").cast(DataType::Float64);
    let spread = col("high").cast(DataType::Float64) - col("low").cast(DataType::Float64);
    let range = when(open.clone().eq(lit(0.0)))
        .then(lit(f64::NAN))
        .otherwise(spread / open * lit(100.0))
        .fill_null(lit(f64::NAN))
        .alias(output);

    table.with_expr(range)
}

/// High-low spread as a percentage of the open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntradayRange {
    output: String,
}

impl IntradayRange {
    /// Write the range to `output`.
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

impl Default for IntradayRange {
    fn default() -> Self {
        Self::new("intraday_range")
    }
}

impl Feature for IntradayRange {
    fn name(&self) -> &str {
        &self.output
    }

    fn description(&self) -> &str {
        "Intraday volatility: (high - low) / open * 100"
    }

    fn kind(&self) -> FeatureKind {
        FeatureKind::Range
    }

    fn required_columns(&self) -> Vec<&str> {
        vec!["open", "high", "low"]
    }

    fn derive(&self, table: &AlignedTable) -> Result<AlignedTable> {
        intraday_range(table, &self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    #[test]
    fn test_intraday_range() {
        let dates = (1..=3)
            .map(|d| NaiveDate::from_ymd_opt(2024, 2, d).unwrap())
            .collect();
        let table = AlignedTable::from_columns(
            "005930",
            dates,
            vec![
                ("open".to_string(), vec![100.0, 0.0, 50.0]),
                ("high".to_string(), vec![105.0, 3.0, 51.0]),
                ("low".to_string(), vec![98.0, 1.0, 49.0]),
            ],
        )
        .unwrap();

        let out = IntradayRange::default().derive(&table).unwrap();
        let range = out.values("intraday_range").unwrap();
        assert_relative_eq!(range[0], 7.0, epsilon = 1e-12);
        assert!(range[1].is_nan());
        assert_relative_eq!(range[2], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_intraday_range_needs_ohl() {
        let table = AlignedTable::from_columns(
            "t",
            vec![NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()],
            vec![("close".to_string(), vec![1.0])],
        )
        .unwrap();
        assert!(intraday_range(&table, "r").is_err());
    }
}
