//! Trailing quantile thresholds.
//!
//! Row `i` holds the `q` quantile of the last `window` rows ending at `i`
//! (inclusive). Rows before the window fills are NaN, as are windows holding
//! a NaN.

use super::{Feature, FeatureKind};
use crate::{AlignedTable, PulseError, Result, stats};
use serde::{Deserialize, Serialize};

fn validate(window: usize, quantile: f64) -> Result<()> {
    if window == 0 {
        return Err(PulseError::InvalidParameter(
            "rolling window must be at least 1 row".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&quantile) {
        return Err(PulseError::InvalidParameter(format!(
            "quantile {quantile} is outside [0, 1]"
        )));
    }
    Ok(())
}

/// Append a trailing `window`-row quantile of `column` to a copy of `table`.
pub fn rolling_quantile(
    table: &AlignedTable,
    column: &str,
    window: usize,
    quantile: f64,
    output: &str,
) -> Result<AlignedTable> {
    validate(window, quantile)?;
    table.require(column)?;
    table.with_expr(stats::rolling_quantile(column, window, quantile).alias(output))
}

/// Configuration for [`RollingQuantile`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingQuantileConfig {
    /// Trailing window length in rows
    pub window: usize,
    /// Quantile in `[0, 1]`
    pub quantile: f64,
}

impl Default for RollingQuantileConfig {
    fn default() -> Self {
        Self {
            window: 20,
            quantile: 0.9,
        }
    }
}

/// Trailing quantile of one column, usable as a moving event threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingQuantile {
    column: String,
    output: String,
    config: RollingQuantileConfig,
}

impl RollingQuantile {
    /// Rolling quantile of `column` written to `output`.
    pub fn new(
        column: impl Into<String>,
        output: impl Into<String>,
        config: RollingQuantileConfig,
    ) -> Self {
        Self {
            column: column.into(),
            output: output.into(),
            config,
        }
    }

    /// Window and quantile in use.
    pub const fn config(&self) -> &RollingQuantileConfig {
        &self.config
    }
}

impl Feature for RollingQuantile {
    fn name(&self) -> &str {
        &self.output
    }

    fn description(&self) -> &str {
        "Trailing-window quantile, NaN until the window holds only finite values"
    }

    fn kind(&self) -> FeatureKind {
        FeatureKind::Threshold
    }

    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn derive(&self, table: &AlignedTable) -> Result<AlignedTable> {
        rolling_quantile(
            table,
            &self.column,
            self.config.window,
            self.config.quantile,
            &self.output,
        )
    }
}
