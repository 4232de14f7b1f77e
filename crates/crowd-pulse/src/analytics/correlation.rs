//! Pairwise Pearson correlation between predictors and forward targets.
//!
//! Each `(predictor, target)` pair uses only the rows where both columns are
//! finite (pairwise deletion). A pair with fewer than two such rows, or with
//! a constant side, has an undefined (NaN) coefficient.

use crate::{AlignedTable, Result, stats};
use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument};

/// Pearson correlation of `x` and `y` over pairwise-complete rows.
///
/// NaN when fewer than two pairs remain or either side is constant.
///
/// # Errors
///
/// Fails when `x` and `y` differ in length.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    let frame = DataFrame::new(vec![Column::new("x".into(), x), Column::new("y".into(), y)])?;
    Ok(stats::pearson_pairwise(&frame, "x", "y")?.0)
}

/// One cell of a [`CorrelationMatrix`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationEntry {
    /// Predictor column (community metric)
    pub predictor: String,
    /// Target column (forward return or volume change)
    pub target: String,
    /// Coefficient in `[-1, 1]`, NaN when undefined
    pub coefficient: f64,
    /// Number of paired finite observations used
    pub observations: usize,
}

impl CorrelationEntry {
    /// Whether the coefficient is defined.
    pub fn is_defined(&self) -> bool {
        self.coefficient.is_finite()
    }
}

/// Predictor × target correlations, in predictor-major order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrelationMatrix {
    /// Row labels
    pub predictors: Vec<String>,
    /// Column labels
    pub targets: Vec<String>,
    /// One entry per `(predictor, target)` pair
    pub entries: Vec<CorrelationEntry>,
}

impl CorrelationMatrix {
    /// Entry for `(predictor, target)`.
    pub fn get(&self, predictor: &str, target: &str) -> Option<&CorrelationEntry> {
        self.entries
            .iter()
            .find(|e| e.predictor == predictor && e.target == target)
    }

    /// Coefficient for `(predictor, target)`, NaN when absent or undefined.
    pub fn coefficient(&self, predictor: &str, target: &str) -> f64 {
        self.get(predictor, target)
            .map_or(f64::NAN, |e| e.coefficient)
    }

    /// Coefficients as rows (predictors) by columns (targets).
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.entries
            .chunks(self.targets.len().max(1))
            .map(|row| row.iter().map(|e| e.coefficient).collect())
            .collect()
    }

    /// Entries sorted by absolute coefficient, strongest first; undefined last.
    pub fn strongest(&self) -> Vec<&CorrelationEntry> {
        let mut sorted: Vec<_> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            let a = if a.is_defined() { a.coefficient.abs() } else { -1.0 };
            let b = if b.is_defined() { b.coefficient.abs() } else { -1.0 };
            b.total_cmp(&a)
        });
        sorted
    }
}

/// Correlate every predictor column with every target column of `table`.
///
/// # Errors
///
/// [`PulseError::MissingColumn`](crate::PulseError::MissingColumn) if any
/// named column is absent.
#[instrument(skip_all, fields(predictors = predictors.len(), targets = targets.len()))]
pub fn correlation_matrix<P, T>(
    table: &AlignedTable,
    predictors: &[P],
    targets: &[T],
) -> Result<CorrelationMatrix>
where
    P: AsRef<str>,
    T: AsRef<str>,
{
    for name in predictors
        .iter()
        .map(|p| p.as_ref())
        .chain(targets.iter().map(|t| t.as_ref()))
    {
        table.require(name)?;
    }

    let mut entries = Vec::with_capacity(predictors.len() * targets.len());
    for predictor in predictors {
        for target in targets {
            let (coefficient, observations) =
                stats::pearson_pairwise(table.frame(), predictor.as_ref(), target.as_ref())?;
            entries.push(CorrelationEntry {
                predictor: predictor.as_ref().to_string(),
                target: target.as_ref().to_string(),
                coefficient,
                observations,
            });
        }
    }

    let undefined = entries.iter().filter(|e| !e.is_defined()).count();
    debug!(pairs = entries.len(), undefined, "computed correlation matrix");

    Ok(CorrelationMatrix {
        predictors: predictors.iter().map(|p| p.as_ref().to_string()).collect(),
        targets: targets.iter().map(|t| t.as_ref().to_string()).collect(),
        entries,
    })
}
