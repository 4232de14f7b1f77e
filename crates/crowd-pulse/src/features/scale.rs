//! Whole-column rescaling.
//!
//! Both transforms use the column exactly as given. Callers that want
//! scaling over a particular window trim the table first.

use super::{Feature, FeatureKind};
use crate::{AlignedTable, Result, stats};

/// Append `output = minmax_0_100(column)` to a copy of `table`.
///
/// Minimum maps to 0, maximum to 100, a constant or all-NaN column to 50.
pub fn minmax_0_100(table: &AlignedTable, column: &str, output: &str) -> Result<AlignedTable> {
    table.require(column)?;
    table.with_expr(stats::minmax_0_100(column).alias(output))
}

/// Append `output = zscore(column)` to a copy of `table`.
///
/// Uses the sample standard deviation (ddof = 1); zero deviation gives 0.
pub fn zscore(table: &AlignedTable, column: &str, output: &str) -> Result<AlignedTable> {
    table.require(column)?;
    table.with_expr(stats::zscore(column).alias(output))
}

/// Min-max rescaling to `[0, 100]` for pattern comparison across metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinMaxScale {
    column: String,
    output: String,
}

impl MinMaxScale {
    /// Scale `column` into `output`.
    pub fn new(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            output: output.into(),
        }
    }
}

impl Feature for MinMaxScale {
    fn name(&self) -> &str {
        &self.output
    }

    fn description(&self) -> &str {
        "Min-max rescaling to 0..100, constant columns map to 50"
    }

    fn kind(&self) -> FeatureKind {
        FeatureKind::Scale
    }

    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn derive(&self, table: &AlignedTable) -> Result<AlignedTable> {
        minmax_0_100(table, &self.column, &self.output)
    }
}

/// Z-score normalization with the sample standard deviation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZScore {
    column: String,
    output: String,
}

impl ZScore {
    /// Normalize `column` into `output`.
    pub fn new(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            output: output.into(),
        }
    }
}

impl Feature for ZScore {
    fn name(&self) -> &str {
        &self.output
    }

    fn description(&self) -> &str {
        "Z-score over the column (sample std, ddof = 1), 0 when the std is 0"
    }

    fn kind(&self) -> FeatureKind {
        FeatureKind::Scale
    }

    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn derive(&self, table: &AlignedTable) -> Result<AlignedTable> {
        zscore(table, &self.column, &self.output)
    }
}
