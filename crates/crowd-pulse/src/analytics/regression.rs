//! Ordinary least squares of one target on several predictors.
//!
//! Rows with a non-finite target or predictor are dropped (listwise
//! deletion), then `y = b0 + b1 x1 + ... + bk xk` is fitted through the
//! normal equations. Too few rows or collinear predictors give an undefined
//! fit with NaN estimates, not an error.

use crate::series::float_values;
use crate::{AlignedTable, PulseError, Result, stats};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Name of the intercept term.
pub const INTERCEPT: &str = "const";

/// Relative pivot size below which `X'X` is treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Which regression the pipeline fits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Fit the regression at all
    pub enabled: bool,
    /// Target column; the first forward return when unset
    pub target: Option<String>,
    /// Predictor columns; the inner-joined community fields when empty
    pub predictors: Vec<String>,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: None,
            predictors: Vec::new(),
        }
    }
}

/// One fitted coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionTerm {
    /// Predictor name, or [`INTERCEPT`]
    pub name: String,
    /// Coefficient estimate
    pub estimate: f64,
    /// Standard error of the estimate
    pub std_error: f64,
    /// `estimate / std_error`, NaN when the error is zero
    pub t_stat: f64,
}

/// A fitted (or undefined) OLS regression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Regression {
    /// Dependent column
    pub target: String,
    /// Intercept first, then predictors in the order given
    pub terms: Vec<RegressionTerm>,
    /// Coefficient of determination
    pub r_squared: f64,
    /// R² adjusted for the number of predictors
    pub adj_r_squared: f64,
    /// Complete rows used in the fit
    pub observations: usize,
}

impl Regression {
    fn undefined(target: &str, names: &[&str], observations: usize) -> Self {
        Self {
            target: target.to_string(),
            terms: std::iter::once(INTERCEPT)
                .chain(names.iter().copied())
                .map(|name| RegressionTerm {
                    name: name.to_string(),
                    estimate: f64::NAN,
                    std_error: f64::NAN,
                    t_stat: f64::NAN,
                })
                .collect(),
            r_squared: f64::NAN,
            adj_r_squared: f64::NAN,
            observations,
        }
    }

    /// Whether the fit produced estimates.
    pub fn is_defined(&self) -> bool {
        self.terms.iter().all(|t| t.estimate.is_finite())
    }

    /// Term called `name`.
    pub fn term(&self, name: &str) -> Option<&RegressionTerm> {
        self.terms.iter().find(|t| t.name == name)
    }

    /// Estimate for `name`, NaN when absent or undefined.
    pub fn estimate(&self, name: &str) -> f64 {
        self.term(name).map_or(f64::NAN, |t| t.estimate)
    }
}

/// Gauss-Jordan inverse with partial pivoting, `None` when singular.
fn invert(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let n = matrix.nrows();
    let scale = matrix.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if scale == 0.0 {
        return None;
    }
    let tolerance = scale * SINGULAR_TOLERANCE;

    let mut a = matrix.clone();
    let mut inverse = Array2::<f64>::eye(n);
    for pivot_col in 0..n {
        let pivot_row = (pivot_col..n)
            .max_by(|&i, &j| a[[i, pivot_col]].abs().total_cmp(&a[[j, pivot_col]].abs()))?;
        if a[[pivot_row, pivot_col]].abs() <= tolerance {
            return None;
        }
        if pivot_row != pivot_col {
            for k in 0..n {
                a.swap([pivot_row, k], [pivot_col, k]);
                inverse.swap([pivot_row, k], [pivot_col, k]);
            }
        }

        let pivot = a[[pivot_col, pivot_col]];
        a.row_mut(pivot_col).mapv_inplace(|v| v / pivot);
        inverse.row_mut(pivot_col).mapv_inplace(|v| v / pivot);

        let a_pivot = a.row(pivot_col).to_owned();
        let inverse_pivot = inverse.row(pivot_col).to_owned();
        for row in (0..n).filter(|&r| r != pivot_col) {
            let factor = a[[row, pivot_col]];
            if factor != 0.0 {
                a.row_mut(row).scaled_add(-factor, &a_pivot);
                inverse.row_mut(row).scaled_add(-factor, &inverse_pivot);
            }
        }
    }
    Some(inverse)
}

/// Fit `target` on `predictors` plus an intercept over the complete rows of `table`.
///
/// # Errors
///
/// - [`PulseError::MissingColumn`] if a named column is absent
/// - [`PulseError::InvalidParameter`] if the target is also a predictor or
///   no predictor is given
#[instrument(skip_all, fields(dependent = %target, predictors = predictors.len()))]
pub fn ols<P: AsRef<str>>(table: &AlignedTable, target: &str, predictors: &[P]) -> Result<Regression> {
    let names: Vec<&str> = predictors.iter().map(|p| p.as_ref()).collect();
    if names.is_empty() {
        return Err(PulseError::InvalidParameter(
            "regression needs at least one predictor".to_string(),
        ));
    }
    if names.contains(&target) {
        return Err(PulseError::InvalidParameter(format!(
            "'{target}' cannot be both target and predictor"
        )));
    }
    table.require(target)?;
    for name in &names {
        table.require(name)?;
    }

    let columns: Vec<&str> = std::iter::once(target).chain(names.iter().copied()).collect();
    let complete = columns
        .iter()
        .map(|c| stats::finite(c).is_not_null())
        .reduce(|acc, mask| acc.and(mask))
        .unwrap_or_else(|| lit(true));
    let rows = table
        .frame()
        .clone()
        .lazy()
        .filter(complete)
        .select(columns.iter().map(|c| col(*c)).collect::<Vec<_>>())
        .collect()?;

    let n = rows.height();
    let p = names.len() + 1;
    if n <= p {
        debug!(n, p, "too few complete rows for regression");
        return Ok(Regression::undefined(target, &names, n));
    }

    let y = Array1::from(float_values(&rows, target)?);
    let values = names
        .iter()
        .map(|name| float_values(&rows, name))
        .collect::<Result<Vec<_>>>()?;
    let x = Array2::from_shape_fn((n, p), |(i, j)| if j == 0 { 1.0 } else { values[j - 1][i] });

    let Some(inverse) = invert(&x.t().dot(&x)) else {
        debug!(n, p, "collinear predictors");
        return Ok(Regression::undefined(target, &names, n));
    };
    let beta = inverse.dot(&x.t().dot(&y));

    let residuals = &y - &x.dot(&beta);
    let ssr = residuals.dot(&residuals);
    let mean_y = y.mean().unwrap_or(f64::NAN);
    let sst = y.mapv(|v| (v - mean_y).powi(2)).sum();
    let (r_squared, adj_r_squared) = if sst > 0.0 {
        let r2 = 1.0 - ssr / sst;
        (r2, 1.0 - (1.0 - r2) * (n - 1) as f64 / (n - p) as f64)
    } else {
        (f64::NAN, f64::NAN)
    };

    let sigma2 = ssr / (n - p) as f64;
    let terms = std::iter::once(INTERCEPT)
        .chain(names.iter().copied())
        .enumerate()
        .map(|(j, name)| {
            let std_error = (sigma2 * inverse[[j, j]]).max(0.0).sqrt();
            RegressionTerm {
                name: name.to_string(),
                estimate: beta[j],
                std_error,
                t_stat: if std_error > 0.0 {
                    beta[j] / std_error
                } else {
                    f64::NAN
                },
            }
        })
        .collect();

    debug!(n, r_squared, "fitted regression");
    Ok(Regression {
        target: target.to_string(),
        terms,
        r_squared,
        adj_r_squared,
        observations: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::pearson;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn table(columns: Vec<(&str, Vec<f64>)>) -> AlignedTable {
        let n = columns[0].1.len();
        let dates = (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024, 8, 1 + i as u32).unwrap())
            .collect();
        AlignedTable::from_columns(
            "t",
            dates,
            columns
                .into_iter()
                .map(|(name, values)| (name.to_string(), values))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_exact_fit_recovers_coefficients() {
        let x1 = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let x2 = vec![2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
        let y = x1
            .iter()
            .zip(&x2)
            .map(|(a, b)| 1.0 + 2.0 * a - 0.5 * b)
            .collect();
        let fit = ols(&table(vec![("y", y), ("x1", x1), ("x2", x2)]), "y", &["x1", "x2"]).unwrap();

        assert!(fit.is_defined());
        assert_eq!(fit.observations, 6);
        assert_relative_eq!(fit.estimate(INTERCEPT), 1.0, epsilon = 1e-9);
        assert_relative_eq!(fit.estimate("x1"), 2.0, epsilon = 1e-9);
        assert_relative_eq!(fit.estimate("x2"), -0.5, epsilon = 1e-9);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_predictor_matches_correlation() {
        // slope = Sxy / Sxx = 6 / 10, r² = 36 / 60
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, f64::NAN, 7.0];
        let y = vec![2.0, 4.0, 5.0, 4.0, 5.0, 9.0, f64::NAN];
        let fit = ols(&table(vec![("y", y.clone()), ("x", x.clone())]), "y", &["x"]).unwrap();

        assert_eq!(fit.observations, 5);
        assert_relative_eq!(fit.estimate("x"), 0.6, epsilon = 1e-12);
        assert_relative_eq!(fit.estimate(INTERCEPT), 2.2, epsilon = 1e-12);
        assert_relative_eq!(fit.r_squared, 0.6, epsilon = 1e-12);
        assert_relative_eq!(fit.r_squared, pearson(&x, &y).unwrap().powi(2), epsilon = 1e-9);
        assert!(fit.term("x").unwrap().std_error > 0.0);
    }

    #[test]
    fn test_constant_predictor_is_undefined() {
        let fit = ols(
            &table(vec![
                ("y", vec![1.0, 3.0, 2.0, 5.0]),
                ("x", vec![1.0, 2.0, 3.0, 4.0]),
                ("flat", vec![2.0; 4]),
            ]),
            "y",
            &["x", "flat"],
        )
        .unwrap();
        assert!(!fit.is_defined());
        assert_eq!(fit.observations, 4);
        assert_eq!(fit.terms.len(), 3);
    }

    #[test]
    fn test_too_few_rows_is_undefined() {
        let fit = ols(
            &table(vec![("y", vec![1.0, 2.0, f64::NAN]), ("x", vec![3.0, 5.0, 6.0])]),
            "y",
            &["x"],
        )
        .unwrap();
        assert!(!fit.is_defined());
        assert_eq!(fit.observations, 2);
    }

    #[test]
    fn test_invalid_arguments() {
        let t = table(vec![("y", vec![1.0, 2.0]), ("x", vec![3.0, 5.0])]);
        assert!(matches!(
            ols(&t, "y", &["likes"]).unwrap_err(),
            PulseError::MissingColumn(ref c) if c == "likes"
        ));
        assert!(matches!(
            ols(&t, "y", &["y"]).unwrap_err(),
            PulseError::InvalidParameter(_)
        ));
        assert!(matches!(
            ols::<&str>(&t, "y", &[]).unwrap_err(),
            PulseError::InvalidParameter(_)
        ));
    }
}
