//! Column statistics as polars expressions.
//!
//! Missing values in this crate are NaN, but polars aggregations skip nulls
//! and not NaN. Every statistic here therefore starts from [`finite`], which
//! turns NaN and ±inf into null. Element-wise results map null back to NaN.

use crate::Result;
use polars::prelude::*;

/// `column` as `Float64`, with non-finite values replaced by null.
pub fn finite(column: &str) -> Expr {
    let x = col(column).cast(DataType::Float64);
    when(x.clone().is_finite())
        .then(x)
        .otherwise(lit(NULL).cast(DataType::Float64))
}

/// Min-max rescaling to `[0, 100]`.
///
/// The minimum maps to 0 and the maximum to 100. A constant column, or one
/// with no finite values, maps to 50 everywhere. Otherwise non-finite inputs
/// stay NaN.
pub fn minmax_0_100(column: &str) -> Expr {
    let x = finite(column);
    let low = x.clone().min();
    let span = x.clone().max() - low.clone();
    when(span.clone().gt(lit(0.0)))
        .then((x - low) / span * lit(100.0))
        .otherwise(lit(50.0))
        .fill_null(lit(f64::NAN))
}

/// Z-score with the sample standard deviation (ddof = 1).
///
/// A zero or undefined standard deviation yields 0 for every finite input.
/// Non-finite inputs stay NaN.
pub fn zscore(column: &str) -> Expr {
    let x = finite(column);
    let std = x.clone().std(1);
    when(std.clone().gt(lit(0.0)))
        .then((x.clone() - x.clone().mean()) / std)
        .when(x.is_not_null())
        .then(lit(0.0))
        .otherwise(lit(f64::NAN))
        .fill_null(lit(f64::NAN))
}

/// Trailing `window`-row quantile with linear interpolation.
///
/// NaN until the window holds `window` finite values.
pub fn rolling_quantile(column: &str, window: usize, quantile: f64) -> Expr {
    finite(column)
        .rolling_quantile(
            QuantileMethod::Linear,
            quantile,
            RollingOptionsFixedWindow {
                window_size: window,
                min_periods: window,
                ..Default::default()
            },
        )
        .fill_null(lit(f64::NAN))
}

fn scalar(frame: &DataFrame, name: &str) -> Result<Option<f64>> {
    let value = frame
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .get(0);
    Ok(value.filter(|v| v.is_finite()))
}

/// Quantile of the finite values of `column`, linear interpolation between
/// order statistics. `None` when the column has no finite value.
pub fn quantile(frame: &DataFrame, column: &str, q: f64) -> Result<Option<f64>> {
    let out = frame
        .clone()
        .lazy()
        .select([finite(column)
            .quantile(lit(q), QuantileMethod::Linear)
            .alias("quantile")])
        .collect()?;
    scalar(&out, "quantile")
}

/// Pearson correlation of `x` and `y` over the rows where both are finite.
///
/// Returns the coefficient, clamped to `[-1, 1]`, and the number of pairs.
/// The coefficient is NaN with fewer than two pairs or a constant side.
pub fn pearson_pairwise(frame: &DataFrame, x: &str, y: &str) -> Result<(f64, usize)> {
    let out = frame
        .clone()
        .lazy()
        .select([finite(x).alias("x"), finite(y).alias("y")])
        .filter(col("x").is_not_null().and(col("y").is_not_null()))
        .select([
            pearson_corr(col("x"), col("y")).alias("r"),
            len().cast(DataType::Float64).alias("n"),
        ])
        .collect()?;

    let n = scalar(&out, "n")?.unwrap_or(0.0) as usize;
    if n < 2 {
        return Ok((f64::NAN, n));
    }
    let r = scalar(&out, "r")?.map_or(f64::NAN, |r| r.clamp(-1.0, 1.0));
    Ok((r, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn frame(columns: &[(&str, &[f64])]) -> DataFrame {
        DataFrame::new(
            columns
                .iter()
                .map(|(name, values)| Column::new((*name).into(), *values))
                .collect(),
        )
        .unwrap()
    }

    fn apply(values: &[f64], expr: Expr) -> Vec<f64> {
        frame(&[("v", values)])
            .lazy()
            .select([expr.alias("out")])
            .collect()
            .unwrap()
            .column("out")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect()
    }

    #[rstest]
    #[case(0.0, 1.0)]
    #[case(1.0, 5.0)]
    #[case(0.5, 3.0)]
    #[case(0.9, 4.6)]
    #[case(0.25, 2.0)]
    fn test_quantile_linear(#[case] q: f64, #[case] expected: f64) {
        let df = frame(&[("v", &[5.0, 1.0, f64::NAN, 3.0, 2.0, 4.0])]);
        assert_relative_eq!(quantile(&df, "v", q).unwrap().unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_quantile_degenerate_inputs() {
        let nan = frame(&[("v", &[f64::NAN, f64::INFINITY])]);
        assert!(quantile(&nan, "v", 0.5).unwrap().is_none());
        let single = frame(&[("v", &[7.0])]);
        assert_eq!(quantile(&single, "v", 0.9).unwrap(), Some(7.0));
    }

    #[test]
    fn test_minmax_bounds() {
        let scaled = apply(&[3.0, 1.0, f64::NAN, 5.0], minmax_0_100("v"));
        assert_relative_eq!(scaled[0], 50.0);
        assert_relative_eq!(scaled[1], 0.0);
        assert!(scaled[2].is_nan());
        assert_relative_eq!(scaled[3], 100.0);
    }

    #[rstest]
    #[case(vec![4.0, 4.0, 4.0])]
    #[case(vec![f64::NAN, f64::NAN])]
    #[case(vec![2.0, f64::NAN])]
    fn test_minmax_constant_is_fifty(#[case] values: Vec<f64>) {
        assert!(apply(&values, minmax_0_100("v")).iter().all(|&v| v == 50.0));
    }

    #[test]
    fn test_zscore_sample_std() {
        // mean 2, sample std 1
        let z = apply(&[1.0, 2.0, 3.0], zscore("v"));
        assert_relative_eq!(z[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(z[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(z[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zscore_zero_std_is_zero() {
        assert_eq!(apply(&[3.0, 3.0, 3.0], zscore("v")), vec![0.0, 0.0, 0.0]);
        assert_eq!(apply(&[3.0], zscore("v")), vec![0.0]);
        let z = apply(&[3.0, f64::NAN, 3.0], zscore("v"));
        assert!(z[1].is_nan());
        assert_eq!(z[0], 0.0);
    }

    #[test]
    fn test_rolling_quantile_skips_incomplete_windows() {
        let q = apply(&[1.0, 3.0, 2.0, f64::NAN, 4.0, 6.0], rolling_quantile("v", 2, 1.0));
        assert!(q[0].is_nan());
        assert_eq!(q[1], 3.0);
        assert_eq!(q[2], 3.0);
        assert!(q[3].is_nan() && q[4].is_nan());
        assert_eq!(q[5], 6.0);
    }

    #[test]
    fn test_pearson_pairwise_deletion() {
        let df = frame(&[
            ("x", &[1.0, 2.0, f64::NAN, 4.0, 5.0]),
            ("y", &[2.0, 4.0, 100.0, 8.0, f64::NAN]),
        ]);
        let (r, n) = pearson_pairwise(&df, "x", "y").unwrap();
        assert_eq!(n, 3);
        assert_relative_eq!(r, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_symmetry() {
        let df = frame(&[
            ("a", &[1.0, 3.0, 2.0, 5.0, 4.0, 7.0]),
            ("b", &[0.5, 1.0, 3.0, 2.0, 6.0, 4.0]),
        ]);
        let (rab, _) = pearson_pairwise(&df, "a", "b").unwrap();
        let (rba, _) = pearson_pairwise(&df, "b", "a").unwrap();
        assert_relative_eq!(rab, rba, epsilon = 1e-12);
        assert!((-1.0..=1.0).contains(&rab));
    }

    #[test]
    fn test_pearson_undefined_cases() {
        let one = frame(&[("x", &[1.0]), ("y", &[2.0])]);
        assert!(pearson_pairwise(&one, "x", "y").unwrap().0.is_nan());

        let flat = frame(&[("x", &[1.0, 1.0, 1.0]), ("y", &[1.0, 2.0, 3.0])]);
        let (r, n) = pearson_pairwise(&flat, "x", "y").unwrap();
        assert!(r.is_nan());
        assert_eq!(n, 3);
    }
}
