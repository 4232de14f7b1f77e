//! Percent-change returns.
//!
//! `change_t = (x_t - x_{t-1}) / x_{t-1} * 100`
//!
//! Row 0 has no predecessor and is NaN. A zero predecessor gives NaN
//! instead of an infinity, and NaN inputs propagate. Applied to `close` this
//! is the daily return; applied to `volume` it is the volume change.

use super::{Feature, FeatureKind};
use crate::{AlignedTable, Result};
use polars::prelude::*;

/// Append `output = percent change of column` to a copy of `table`.
pub fn percent_change(table: &AlignedTable, column: &str, output: &str) -> Result<AlignedTable> {
    table.require(column)?;

    let prev = col(column).cast(DataType::Float64).shift(lit(1));
    let change = when(prev.clone().eq(lit(0.0)))
        .then(lit(f64::NAN))
        .otherwise((col(column).cast(DataType::Float64) - prev.clone()) / prev * lit(100.0))
        .fill_null(lit(f64::NAN))
        .alias(output);

    table.with_expr(change)
}

/// Percent change of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PercentChange {
    column: String,
    output: String,
}

impl PercentChange {
    /// Percent change of `column` written to `output`.
    pub fn new(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            output: output.into(),
        }
    }

    /// Daily close-to-close return, written to `return`.
    pub fn close_return() -> Self {
        Self::new("close", "return")
    }

    /// Daily volume change, written to `volume_change`.
    pub fn volume_change() -> Self {
        Self::new("volume", "volume_change")
    }
}

impl Feature for PercentChange {
    fn name(&self) -> &str {
        &self.output
    }

    fn description(&self) -> &str {
        "Row-over-row percent change, NaN on the first row and after a zero"
    }

    fn kind(&self) -> FeatureKind {
        FeatureKind::Change
    }

    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn derive(&self, table: &AlignedTable) -> Result<AlignedTable> {
        percent_change(table, &self.column, &self.output)
    }
}
