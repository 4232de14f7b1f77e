//! Row shifts and forward-return targets.
//!
//! `shift(col, k)[i] == col[i + k]`. Positive `k` looks ahead (forward
//! targets), negative `k` looks back (lags). Positions whose source row is
//! outside the table are NaN.

use super::{Feature, FeatureKind};
use crate::{AlignedTable, Result};
use polars::prelude::*;

/// Append `output[i] = column[i + k]` to a copy of `table`.
pub fn shift(table: &AlignedTable, column: &str, k: i64, output: &str) -> Result<AlignedTable> {
    table.require(column)?;
    table.with_expr(
        col(column)
            .cast(DataType::Float64)
            .shift(lit(-k))
            .fill_null(lit(f64::NAN))
            .alias(output),
    )
}

/// Column name used for the `k`-row forward target of `prefix`, e.g. `return_t+1`.
pub fn forward_target_name(prefix: &str, k: usize) -> String {
    format!("{prefix}_t+{k}")
}

/// Append one forward target per horizon, named by [`forward_target_name`].
pub fn forward_targets(
    table: &AlignedTable,
    column: &str,
    horizons: &[usize],
    prefix: &str,
) -> Result<AlignedTable> {
    horizons.iter().try_fold(table.clone(), |acc, &k| {
        shift(&acc, column, k as i64, &forward_target_name(prefix, k))
    })
}

/// Whole-row shift of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    column: String,
    periods: i64,
    output: String,
}

impl Shift {
    /// Shift `column` by `periods` rows (positive looks ahead).
    pub fn new(column: impl Into<String>, periods: i64, output: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            periods,
            output: output.into(),
        }
    }

    /// Look `k` rows ahead.
    pub fn forward(column: impl Into<String>, k: usize, output: impl Into<String>) -> Self {
        Self::new(column, k as i64, output)
    }

    /// Number of rows shifted.
    pub const fn periods(&self) -> i64 {
        self.periods
    }
}

impl Feature for Shift {
    fn name(&self) -> &str {
        &self.output
    }

    fn description(&self) -> &str {
        if self.periods >= 0 {
            "Value from a later row (forward target), NaN past the table end"
        } else {
            "Value from an earlier row (lag), NaN before the table start"
        }
    }

    fn kind(&self) -> FeatureKind {
        FeatureKind::Shift
    }

    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn derive(&self, table: &AlignedTable) -> Result<AlignedTable> {
        shift(table, &self.column, self.periods, &self.output)
    }
}
