//! Date alignment of dated series.
//!
//! [`align`] inner-joins any number of series on calendar date: the result
//! holds exactly the dates every input has, so joining a community series
//! onto a price series drops weekends and holidays. [`attach`] left-joins an
//! optional overlay (e.g. an overheat index) onto an existing table without
//! changing its rows.
//!
//! Field names must be unique across inputs. Collisions are rejected rather
//! than suffixed; callers disambiguate with
//! [`DatedSeries::with_prefix`](crate::DatedSeries::with_prefix) or
//! [`DatedSeries::rename`](crate::DatedSeries::rename) first.

use crate::series::DATE_COLUMN;
use crate::{AlignedTable, DatedSeries, PulseError, Result};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, instrument};

fn check_collisions<'a>(
    owners: &mut HashMap<String, &'a str>,
    series: &'a DatedSeries,
) -> Result<()> {
    for field in series.fields() {
        if let Some(first) = owners.get(&field) {
            return Err(PulseError::ColumnCollision {
                column: field,
                first: (*first).to_string(),
                second: series.source().to_string(),
            });
        }
        owners.insert(field, series.source());
    }
    Ok(())
}

/// Inner-join `series` on date into an [`AlignedTable`] sorted by date.
///
/// # Errors
///
/// - [`PulseError::InvalidParameter`] when `series` is empty
/// - [`PulseError::ColumnCollision`] when two inputs share a field name
/// - [`PulseError::EmptyIntersection`] when no date is common to all inputs
#[instrument(skip_all, fields(inputs = series.len()))]
pub fn align(series: &[DatedSeries]) -> Result<AlignedTable> {
    let Some((first, rest)) = series.split_first() else {
        return Err(PulseError::InvalidParameter(
            "align needs at least one series".to_string(),
        ));
    };

    let mut owners = HashMap::new();
    for s in series {
        check_collisions(&mut owners, s)?;
    }

    let mut joined = first.frame().clone().lazy();
    for s in rest {
        joined = joined.join(
            s.frame().clone().lazy(),
            [col(DATE_COLUMN)],
            [col(DATE_COLUMN)],
            JoinArgs::new(JoinType::Inner),
        );
    }
    let frame = joined
        .sort([DATE_COLUMN], SortMultipleOptions::default())
        .collect()?;

    if frame.height() == 0 {
        let sources: Vec<String> = series.iter().map(DatedSeries::describe).collect();
        return Err(PulseError::EmptyIntersection {
            sources: sources.join(", "),
        });
    }

    debug!(
        rows = frame.height(),
        columns = frame.width(),
        "aligned series on date"
    );
    let sources = series.iter().map(|s| s.source().to_string()).collect();
    Ok(AlignedTable::from_parts(sources, frame))
}

/// Left-join `overlay` onto `table`, keeping every row of `table`.
///
/// Dates the overlay lacks get NaN in its fields. Overlay rows outside the
/// table's dates are ignored.
#[instrument(skip_all, fields(overlay = overlay.source()))]
pub fn attach(table: &AlignedTable, overlay: &DatedSeries) -> Result<AlignedTable> {
    for field in overlay.fields() {
        if table.has_column(&field) {
            return Err(PulseError::ColumnCollision {
                column: field,
                first: table.sources().join("+"),
                second: overlay.source().to_string(),
            });
        }
    }

    let fill: Vec<Expr> = overlay
        .fields()
        .iter()
        .map(|field| col(field.as_str()).fill_null(lit(f64::NAN)))
        .collect();

    let frame = table
        .frame()
        .clone()
        .lazy()
        .join(
            overlay.frame().clone().lazy(),
            [col(DATE_COLUMN)],
            [col(DATE_COLUMN)],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns(fill)
        .sort([DATE_COLUMN], SortMultipleOptions::default())
        .collect()?;

    let mut sources = table.sources().to_vec();
    sources.push(overlay.source().to_string());
    Ok(AlignedTable::from_parts(sources, frame))
}
