//! Quantile event study.
//!
//! Event days are the rows whose metric is at or above the metric's own `q`
//! quantile (linear interpolation) over the whole table. For every offset in
//! a row-based window the study averages the return column across events,
//! skipping positions that fall outside the table or hold no finite return.
//!
//! Offsets count rows of the aligned table, so a holiday between two trading
//! days is not a step.

use crate::{AlignedTable, PulseError, Result, stats};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

/// Inclusive window of row offsets around an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetWindow {
    /// First offset (usually negative)
    pub start: i64,
    /// Last offset
    pub end: i64,
}

impl OffsetWindow {
    /// Window `start..=end`, rejecting `start > end`.
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start > end {
            return Err(PulseError::InvalidParameter(format!(
                "offset window {start}..={end} is inverted"
            )));
        }
        Ok(Self { start, end })
    }

    /// Offsets in ascending order.
    pub const fn offsets(&self) -> std::ops::RangeInclusive<i64> {
        self.start..=self.end
    }

    /// Number of offsets in the window.
    pub fn len(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start + 1) as usize
        }
    }

    /// Whether the window holds no offsets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OffsetWindow {
    fn default() -> Self {
        Self { start: -3, end: 4 }
    }
}

impl fmt::Display for OffsetWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}..={:+}", self.start, self.end)
    }
}

/// Configuration for [`event_study`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventStudyConfig {
    /// Column whose high values define events
    pub metric: String,
    /// Quantile cutoff in `[0, 1]`
    pub quantile: f64,
    /// Row offsets to average over
    pub window: OffsetWindow,
    /// Column averaged at each offset
    pub return_column: String,
}

impl Default for EventStudyConfig {
    fn default() -> Self {
        Self {
            metric: "posts".to_string(),
            quantile: 0.9,
            window: OffsetWindow::default(),
            return_column: "return".to_string(),
        }
    }
}

impl EventStudyConfig {
    /// Config for `metric` with the default quantile, window and return column.
    pub fn for_metric(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            ..Self::default()
        }
    }

    /// Builder: quantile cutoff.
    pub fn with_quantile(mut self, quantile: f64) -> Self {
        self.quantile = quantile;
        self
    }

    /// Builder: offset window.
    pub fn with_window(mut self, window: OffsetWindow) -> Self {
        self.window = window;
        self
    }

    /// Check quantile range and window orientation.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.quantile) {
            return Err(PulseError::InvalidParameter(format!(
                "event quantile {} is outside [0, 1]",
                self.quantile
            )));
        }
        OffsetWindow::new(self.window.start, self.window.end)?;
        Ok(())
    }
}

/// A high-attention row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Row index in the aligned table
    pub row: usize,
    /// Calendar date of the row
    pub date: NaiveDate,
    /// Metric value on that row
    pub metric_value: f64,
}

/// Average return at one relative offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OffsetMean {
    /// Rows relative to the event row
    pub offset: i64,
    /// Mean across contributing events, NaN with no observations
    pub mean_return: f64,
    /// Number of events with a finite return at this offset
    pub observations: usize,
}

/// Result of [`event_study`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventStudy {
    /// Metric column
    pub metric: String,
    /// Quantile used for the cutoff
    pub quantile: f64,
    /// Cutoff value, NaN when the metric has no finite values
    pub threshold: f64,
    /// Window the profile covers
    pub window: OffsetWindow,
    /// Event rows in ascending order
    pub events: Vec<Event>,
    /// One entry per offset, ascending
    pub profile: Vec<OffsetMean>,
}

impl EventStudy {
    /// Whether at least one event was found.
    pub fn is_defined(&self) -> bool {
        !self.events.is_empty()
    }

    /// Mean return at `offset`, NaN outside the window or without observations.
    pub fn mean_at(&self, offset: i64) -> f64 {
        self.profile
            .iter()
            .find(|p| p.offset == offset)
            .map_or(f64::NAN, |p| p.mean_return)
    }

    /// `(offset, mean_return)` pairs, the chart-ready trajectory.
    pub fn trajectory(&self) -> Vec<(i64, f64)> {
        self.profile
            .iter()
            .map(|p| (p.offset, p.mean_return))
            .collect()
    }
}

/// Value at `row + offset`, `None` when out of bounds or non-finite.
pub(crate) fn value_at(values: &[f64], row: usize, offset: i64) -> Option<f64> {
    let target = row as i64 + offset;
    if target < 0 {
        return None;
    }
    values
        .get(target as usize)
        .copied()
        .filter(|v| v.is_finite())
}

/// Rows whose `metric` value is at or above `threshold`.
fn select_events(dates: &[NaiveDate], metric: &[f64], threshold: f64) -> Vec<Event> {
    if !threshold.is_finite() {
        return Vec::new();
    }
    metric
        .iter()
        .zip(dates)
        .enumerate()
        .filter(|(_, (value, _))| value.is_finite() && **value >= threshold)
        .map(|(row, (&metric_value, &date))| Event {
            row,
            date,
            metric_value,
        })
        .collect()
}

/// Run the event study described by `config` over `table`.
///
/// # Errors
///
/// - [`PulseError::MissingColumn`] if the metric or return column is absent
/// - [`PulseError::InvalidParameter`] for a quantile outside `[0, 1]` or an
///   inverted window
#[instrument(skip_all, fields(metric = %config.metric, q = config.quantile, window = %config.window))]
pub fn event_study(table: &AlignedTable, config: &EventStudyConfig) -> Result<EventStudy> {
    config.validate()?;
    let metric = table.values(&config.metric)?;
    let returns = table.values(&config.return_column)?;
    let dates = table.dates()?;

    let threshold = stats::quantile(table.frame(), &config.metric, config.quantile)?
        .unwrap_or(f64::NAN);
    let events = select_events(&dates, &metric, threshold);

    let profile = config
        .window
        .offsets()
        .map(|offset| {
            let observed: Vec<f64> = events
                .iter()
                .filter_map(|e| value_at(&returns, e.row, offset))
                .collect();
            let mean_return = if observed.is_empty() {
                f64::NAN
            } else {
                observed.iter().sum::<f64>() / observed.len() as f64
            };
            OffsetMean {
                offset,
                mean_return,
                observations: observed.len(),
            }
        })
        .collect();

    debug!(threshold, events = events.len(), "event study complete");
    Ok(EventStudy {
        metric: config.metric.clone(),
        quantile: config.quantile,
        threshold,
        window: config.window,
        events,
        profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::percent_change;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn scenario(metric: Vec<f64>) -> AlignedTable {
        let close = vec![
            100.0, 102.0, 101.0, 105.0, 103.0, 108.0, 107.0, 110.0, 109.0, 112.0,
        ];
        let dates = (1..=10)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect();
        let table = AlignedTable::from_columns(
            "scenario",
            dates,
            vec![("close".to_string(), close), ("posts".to_string(), metric)],
        )
        .unwrap();
        percent_change(&table, "close", "return").unwrap()
    }

    #[test]
    fn test_single_event_profile_is_raw_returns() {
        let table = scenario(vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0, 6.0, 7.0, 8.0, 9.0]);
        let config = EventStudyConfig::for_metric("posts")
            .with_window(OffsetWindow::new(-2, 2).unwrap());
        let study = event_study(&table, &config).unwrap();

        assert_eq!(study.events.len(), 1);
        assert_eq!(study.events[0].row, 5);
        assert_eq!(
            study.events[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()
        );
        assert_relative_eq!(study.threshold, 18.1, epsilon = 1e-9);

        let returns = table.values("return").unwrap();
        assert_eq!(study.profile.len(), 5);
        for (i, point) in study.profile.iter().enumerate() {
            assert_eq!(point.offset, i as i64 - 2);
            assert_eq!(point.observations, 1);
            assert_relative_eq!(point.mean_return, returns[3 + i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_window_stays_inside_configured_range() {
        let table = scenario(vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0, 6.0, 7.0, 8.0, 9.0]);
        let study = event_study(&table, &EventStudyConfig::for_metric("posts")).unwrap();
        let offsets: Vec<i64> = study.profile.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, (-3..=4).collect::<Vec<_>>());
        assert!(study.mean_at(5).is_nan());
        assert!(study.mean_at(-4).is_nan());
    }

    #[test]
    fn test_offsets_past_table_edges_are_skipped() {
        // event at row 1: offsets -3 and -2 fall before row 0, and row 0 has no return
        let table = scenario(vec![1.0, 100.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 2.0]);
        let study = event_study(&table, &EventStudyConfig::for_metric("posts")).unwrap();

        assert_eq!(study.events.len(), 1);
        assert_eq!(study.events[0].row, 1);
        for offset in [-3, -2, -1] {
            let point = study.profile.iter().find(|p| p.offset == offset).unwrap();
            assert_eq!(point.observations, 0);
            assert!(point.mean_return.is_nan());
        }
        assert_eq!(study.profile.last().unwrap().observations, 1);
    }

    #[test]
    fn test_ties_at_cutoff_are_events() {
        let table = scenario(vec![5.0; 10]);
        let study = event_study(&table, &EventStudyConfig::for_metric("posts")).unwrap();
        assert_eq!(study.events.len(), 10);
        let zero = study.profile.iter().find(|p| p.offset == 0).unwrap();
        // row 0 has no return
        assert_eq!(zero.observations, 9);
    }

    #[test]
    fn test_no_finite_metric_has_no_events() {
        let table = scenario(vec![f64::NAN; 10]);
        let study = event_study(&table, &EventStudyConfig::for_metric("posts")).unwrap();
        assert!(!study.is_defined());
        assert!(study.threshold.is_nan());
        assert!(study.profile.iter().all(|p| p.mean_return.is_nan()));
    }

    #[rstest]
    #[case(EventStudyConfig::for_metric("posts").with_quantile(1.2))]
    #[case(EventStudyConfig::for_metric("posts").with_window(OffsetWindow { start: 3, end: -3 }))]
    fn test_invalid_config(#[case] config: EventStudyConfig) {
        assert!(matches!(
            event_study(&scenario(vec![1.0; 10]), &config).unwrap_err(),
            PulseError::InvalidParameter(_)
        ));
    }

    #[test]
    fn test_value_at_bounds() {
        let values = [1.0, f64::NAN, 3.0];
        assert_eq!(value_at(&values, 0, -1), None);
        assert_eq!(value_at(&values, 0, 1), None);
        assert_eq!(value_at(&values, 0, 2), Some(3.0));
        assert_eq!(value_at(&values, 2, 1), None);
    }
}
