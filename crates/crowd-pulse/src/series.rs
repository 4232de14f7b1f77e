//! Dated series and aligned tables.
//!
//! Both types wrap a polars [`DataFrame`] with a `date` column of dtype
//! `Date` followed by `Float64` field columns. A [`DatedSeries`] comes from a
//! single source and may have gaps; an [`AlignedTable`] is the date
//! intersection of several series and is what features and analytics read.
//! Neither type is mutated in place: every transformation returns a copy.

use crate::{PulseError, Result};
use chrono::{Days, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Name of the calendar-date key column.
pub const DATE_COLUMN: &str = "date";

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First date in the range
    pub start: NaiveDate,
    /// Last date in the range
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(PulseError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Whether `date` falls inside the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The same range with its start moved `days` calendar days earlier.
    pub fn extend_back(&self, days: u64) -> Self {
        Self {
            start: self
                .start
                .checked_sub_days(Days::new(days))
                .unwrap_or(NaiveDate::MIN),
            end: self.end,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Build a `date` + float-columns frame.
pub(crate) fn build_frame(
    dates: Vec<NaiveDate>,
    columns: Vec<(String, Vec<f64>)>,
) -> Result<DataFrame> {
    let mut cols: Vec<Column> = Vec::with_capacity(columns.len() + 1);
    cols.push(
        DateChunked::from_naive_date(DATE_COLUMN.into(), dates)
            .into_series()
            .into(),
    );
    for (name, values) in columns {
        cols.push(Series::new(name.into(), values).into());
    }
    Ok(DataFrame::new(cols)?)
}

/// Extract a column as `f64`, mapping nulls to NaN.
pub(crate) fn float_values(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = frame
        .column(name)
        .map_err(|_| PulseError::MissingColumn(name.to_string()))?;
    let casted = column.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Extract the `date` column.
pub(crate) fn frame_dates(frame: &DataFrame) -> Result<Vec<NaiveDate>> {
    let column = frame
        .column(DATE_COLUMN)
        .map_err(|_| PulseError::MissingColumn(DATE_COLUMN.to_string()))?;
    column
        .as_materialized_series()
        .date()?
        .as_date_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| PulseError::InvalidParameter("null value in date column".to_string()))
}

/// Field (non-date) column names in frame order.
pub(crate) fn frame_fields(frame: &DataFrame) -> Vec<String> {
    frame
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != DATE_COLUMN)
        .map(|name| name.to_string())
        .collect()
}

/// Keep the rows whose date falls inside `range`.
pub(crate) fn filter_range(frame: &DataFrame, range: DateRange) -> Result<DataFrame> {
    Ok(frame
        .clone()
        .lazy()
        .filter(
            col(DATE_COLUMN)
                .gt_eq(lit(range.start))
                .and(col(DATE_COLUMN).lt_eq(lit(range.end))),
        )
        .collect()?)
}

fn span_of(dates: &[NaiveDate]) -> Option<DateRange> {
    match (dates.first(), dates.last()) {
        (Some(&start), Some(&end)) => Some(DateRange { start, end }),
        _ => None,
    }
}

fn ensure_strictly_increasing(source: &str, dates: &[NaiveDate]) -> Result<()> {
    match dates.windows(2).find(|w| w[0] >= w[1]) {
        Some(w) => Err(PulseError::Parse {
            source_id: source.to_string(),
            detail: format!("dates are not strictly increasing at {} -> {}", w[0], w[1]),
        }),
        None => Ok(()),
    }
}

/// A date-indexed, gap-permitting set of named numeric fields from one source.
///
/// Invariant: dates are strictly increasing and unique.
#[derive(Debug, Clone)]
pub struct DatedSeries {
    source: String,
    frame: DataFrame,
}

impl DatedSeries {
    /// Create a series from dates and equally long field columns.
    ///
    /// `source` identifies where the data came from (file path, ticker) and
    /// appears in every error about this series.
    pub fn new(
        source: impl Into<String>,
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let source = source.into();
        ensure_strictly_increasing(&source, &dates)?;

        let mut seen = HashSet::new();
        for (name, values) in &columns {
            if name == DATE_COLUMN || !seen.insert(name.as_str()) {
                return Err(PulseError::InvalidParameter(format!(
                    "duplicate or reserved field name '{name}' in {source}"
                )));
            }
            if values.len() != dates.len() {
                return Err(PulseError::InvalidParameter(format!(
                    "field '{name}' in {source} has {} values for {} dates",
                    values.len(),
                    dates.len()
                )));
            }
        }

        let frame = build_frame(dates, columns)?;
        Ok(Self { source, frame })
    }

    /// Wrap an existing frame that has a `date` column of dtype `Date`.
    ///
    /// The frame is sorted by date; duplicate dates are rejected.
    pub fn from_frame(source: impl Into<String>, frame: DataFrame) -> Result<Self> {
        let source = source.into();
        if frame.column(DATE_COLUMN).is_err() {
            return Err(PulseError::Schema {
                source_id: source,
                column: DATE_COLUMN.to_string(),
            });
        }
        let frame = frame
            .lazy()
            .sort([DATE_COLUMN], SortMultipleOptions::default())
            .collect()?;
        ensure_strictly_increasing(&source, &frame_dates(&frame)?)?;
        Ok(Self { source, frame })
    }

    /// Source identifier.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Underlying frame.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Number of dated rows.
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    /// Whether the series has no rows.
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        frame_dates(&self.frame)
    }

    /// Field names, excluding the date column.
    pub fn fields(&self) -> Vec<String> {
        frame_fields(&self.frame)
    }

    /// Whether the series has a field called `name`.
    pub fn has_field(&self, name: &str) -> bool {
        name != DATE_COLUMN && self.frame.column(name).is_ok()
    }

    /// Values of one field, NaN where missing.
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        float_values(&self.frame, name)
    }

    /// First and last date, or `None` for an empty series.
    pub fn span(&self) -> Result<Option<DateRange>> {
        Ok(span_of(&self.dates()?))
    }

    /// Copy with every field renamed to `{prefix}{field}`.
    pub fn with_prefix(&self, prefix: &str) -> Result<Self> {
        let mut exprs = vec![col(DATE_COLUMN)];
        exprs.extend(
            self.fields()
                .into_iter()
                .map(|field| col(field.as_str()).alias(format!("{prefix}{field}"))),
        );
        self.project(exprs)
    }

    /// Copy with field `from` renamed to `to`.
    pub fn rename(&self, from: &str, to: &str) -> Result<Self> {
        if !self.has_field(from) {
            return Err(PulseError::Schema {
                source_id: self.source.clone(),
                column: from.to_string(),
            });
        }
        if to == DATE_COLUMN || (to != from && self.has_field(to)) {
            return Err(PulseError::InvalidParameter(format!(
                "cannot rename '{from}' to existing column '{to}' in {}",
                self.source
            )));
        }
        let mut exprs = vec![col(DATE_COLUMN)];
        exprs.extend(self.fields().into_iter().map(|field| {
            if field == from {
                col(field.as_str()).alias(to)
            } else {
                col(field.as_str())
            }
        }));
        self.project(exprs)
    }

    /// Copy keeping only the listed fields.
    pub fn select(&self, fields: &[&str]) -> Result<Self> {
        let mut exprs = vec![col(DATE_COLUMN)];
        for &field in fields {
            if !self.has_field(field) {
                return Err(PulseError::Schema {
                    source_id: self.source.clone(),
                    column: field.to_string(),
                });
            }
            exprs.push(col(field));
        }
        self.project(exprs)
    }

    /// Copy keeping only the rows inside `range`. May be empty.
    pub fn trim(&self, range: DateRange) -> Result<Self> {
        Ok(Self {
            source: self.source.clone(),
            frame: filter_range(&self.frame, range)?,
        })
    }

    fn project(&self, exprs: Vec<Expr>) -> Result<Self> {
        Ok(Self {
            source: self.source.clone(),
            frame: self.frame.clone().lazy().select(exprs).collect()?,
        })
    }

    /// Human-readable `source[start..=end]` label used in error messages.
    pub(crate) fn describe(&self) -> String {
        match self.span() {
            Ok(Some(span)) => format!("{}[{span}]", self.source),
            _ => format!("{}[empty]", self.source),
        }
    }
}

/// The date intersection of several [`DatedSeries`].
///
/// Invariants: rows are sorted ascending by date, the table is never empty,
/// and every row has a value (possibly NaN) for every joined field.
#[derive(Debug, Clone)]
pub struct AlignedTable {
    sources: Vec<String>,
    frame: DataFrame,
}

impl AlignedTable {
    pub(crate) const fn from_parts(sources: Vec<String>, frame: DataFrame) -> Self {
        Self { sources, frame }
    }

    /// Build a table directly from dates and columns.
    ///
    /// Mostly useful for tests and for callers that already hold aligned data.
    pub fn from_columns(
        source: impl Into<String>,
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let series = DatedSeries::new(source, dates, columns)?;
        if series.is_empty() {
            return Err(PulseError::EmptyIntersection {
                sources: series.describe(),
            });
        }
        Ok(Self {
            sources: vec![series.source],
            frame: series.frame,
        })
    }

    /// Identifiers of the series this table was built from.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Underlying frame.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        frame_dates(&self.frame)
    }

    /// Field names, excluding the date column.
    pub fn fields(&self) -> Vec<String> {
        frame_fields(&self.frame)
    }

    /// Whether the table has a field called `name`.
    pub fn has_column(&self, name: &str) -> bool {
        name != DATE_COLUMN && self.frame.column(name).is_ok()
    }

    /// Fail with [`PulseError::MissingColumn`] unless `name` is present.
    pub fn require(&self, name: &str) -> Result<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(PulseError::MissingColumn(name.to_string()))
        }
    }

    /// Values of one column, NaN where missing.
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        float_values(&self.frame, name)
    }

    /// First and last date.
    pub fn span(&self) -> Result<Option<DateRange>> {
        Ok(span_of(&self.dates()?))
    }

    /// Row index of `date`, if present.
    pub fn row_of(&self, date: NaiveDate) -> Result<Option<usize>> {
        Ok(self.dates()?.binary_search(&date).ok())
    }

    /// Copy with a lazily evaluated column expression appended.
    pub(crate) fn with_expr(&self, expr: Expr) -> Result<Self> {
        Ok(Self {
            sources: self.sources.clone(),
            frame: self.frame.clone().lazy().with_column(expr).collect()?,
        })
    }

    /// Copy keeping only rows inside `range`.
    ///
    /// An empty result is reported as [`PulseError::EmptyIntersection`], so
    /// downstream analytics never run on an empty table.
    pub fn trim(&self, range: DateRange) -> Result<Self> {
        let frame = filter_range(&self.frame, range)?;
        if frame.height() == 0 {
            return Err(PulseError::EmptyIntersection {
                sources: format!("{} within {range}", self.sources.join(", ")),
            });
        }
        Ok(Self {
            sources: self.sources.clone(),
            frame,
        })
    }
}
