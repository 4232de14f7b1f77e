//! Rule-based classification of price behaviour around events.
//!
//! For each event the returns in the `pre_rows` rows before the event row and
//! the `post_rows` rows after it are summed, skipping missing rows, and the
//! two sums are bucketed by [`PatternThresholds`]. The rule table is
//! deterministic; the thresholds are tunable, not fitted.

use super::event_study::{EventStudy, value_at};
use crate::{AlignedTable, Result};
use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Price behaviour around one event.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePattern {
    /// Run-up before the event, decline after it
    #[display("sell-the-news")]
    SellTheNews,
    /// Decline before the event, recovery after it
    #[display("reversal")]
    Reversal,
    /// Little movement after the event
    #[display("no-reaction")]
    NoReaction,
    /// Anything else
    #[display("co-movement")]
    CoMovement,
}

/// Trading activity on the event day relative to the days before it.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeReaction {
    /// Volume above `volume_ratio` times the pre-window mean
    #[display("active")]
    Active,
    /// Volume at or below that level, or no baseline to compare against
    #[display("calm")]
    Calm,
}

/// Cutoffs for [`PricePattern`] and [`VolumeReaction`], in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternThresholds {
    /// Pre-sum above this, together with a low post-sum, is sell-the-news
    pub sell_pre_above: f64,
    /// Post-sum below this, together with a high pre-sum, is sell-the-news
    pub sell_post_below: f64,
    /// Pre-sum below this, together with a high post-sum, is a reversal
    pub reversal_pre_below: f64,
    /// Post-sum above this, together with a low pre-sum, is a reversal
    pub reversal_post_above: f64,
    /// `|post-sum|` below this is no reaction
    pub no_reaction_band: f64,
    /// Event volume over pre-window mean volume above this is active
    pub volume_ratio: f64,
    /// Rows before the event summed into the pre-sum and the volume baseline
    pub pre_rows: usize,
    /// Rows after the event summed into the post-sum
    pub post_rows: usize,
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            sell_pre_above: 2.0,
            sell_post_below: -1.0,
            reversal_pre_below: -2.0,
            reversal_post_above: 1.0,
            no_reaction_band: 1.5,
            volume_ratio: 1.5,
            pre_rows: 5,
            post_rows: 5,
        }
    }
}

impl PatternThresholds {
    /// Bucket one event by its pre- and post-window return sums.
    ///
    /// Rules are checked in order: sell-the-news, reversal, no reaction,
    /// co-movement.
    pub fn classify(&self, pre_sum: f64, post_sum: f64) -> PricePattern {
        if pre_sum > self.sell_pre_above && post_sum < self.sell_post_below {
            PricePattern::SellTheNews
        } else if pre_sum < self.reversal_pre_below && post_sum > self.reversal_post_above {
            PricePattern::Reversal
        } else if post_sum.abs() < self.no_reaction_band {
            PricePattern::NoReaction
        } else {
            PricePattern::CoMovement
        }
    }

    /// Compare event-day volume against the mean of the finite earlier volumes.
    ///
    /// Calm when either side is undefined.
    pub fn volume_reaction(&self, event_volume: f64, prior: &[f64]) -> VolumeReaction {
        let prior: Vec<f64> = prior.iter().copied().filter(|v| v.is_finite()).collect();
        if prior.is_empty() || !event_volume.is_finite() {
            return VolumeReaction::Calm;
        }
        let baseline = prior.iter().sum::<f64>() / prior.len() as f64;
        if event_volume > self.volume_ratio * baseline {
            VolumeReaction::Active
        } else {
            VolumeReaction::Calm
        }
    }
}

/// One event with its window sums and classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedEvent {
    /// Event date
    pub date: NaiveDate,
    /// Event row
    pub row: usize,
    /// Sum of returns over the `pre_rows` rows before the event
    pub pre_sum: f64,
    /// Sum of returns over the `post_rows` rows after the event
    pub post_sum: f64,
    /// Price bucket
    pub pattern: PricePattern,
    /// Volume bucket, if a volume column was given
    pub volume: Option<VolumeReaction>,
}

/// Classified events plus per-pattern counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternSummary {
    /// Events in row order
    pub events: Vec<ClassifiedEvent>,
    /// Number of events per pattern
    pub counts: BTreeMap<PricePattern, usize>,
}

impl PatternSummary {
    /// Number of events classified as `pattern`.
    pub fn count(&self, pattern: PricePattern) -> usize {
        self.counts.get(&pattern).copied().unwrap_or(0)
    }

    /// Most frequent pattern; ties go to the earlier rule. `None` without events.
    pub fn dominant(&self) -> Option<PricePattern> {
        self.counts
            .iter()
            .rev()
            .max_by_key(|(_, count)| **count)
            .map(|(pattern, _)| *pattern)
    }

    /// Share of events with an active volume reaction, `None` without volume.
    pub fn active_share(&self) -> Option<f64> {
        let defined: Vec<_> = self.events.iter().filter_map(|e| e.volume).collect();
        if defined.is_empty() {
            return None;
        }
        let active = defined
            .iter()
            .filter(|v| **v == VolumeReaction::Active)
            .count();
        Some(active as f64 / defined.len() as f64)
    }
}

/// Classify every event of `study` using returns (and optionally volume) from `table`.
///
/// Sums skip offsets outside the table and non-finite returns, so an event
/// with nothing before it has a pre-sum of 0.
pub fn classify_events(
    table: &AlignedTable,
    study: &EventStudy,
    return_column: &str,
    volume_column: Option<&str>,
    thresholds: &PatternThresholds,
) -> Result<PatternSummary> {
    let returns = table.values(return_column)?;
    let volume = volume_column.map(|c| table.values(c)).transpose()?;

    let before = -(thresholds.pre_rows as i64)..=-1;
    let after = 1..=thresholds.post_rows as i64;
    let sum_over = |row: usize, offsets: std::ops::RangeInclusive<i64>| -> f64 {
        offsets.filter_map(|o| value_at(&returns, row, o)).sum()
    };

    let mut summary = PatternSummary::default();
    for event in &study.events {
        let pre_sum = sum_over(event.row, before.clone());
        let post_sum = sum_over(event.row, after.clone());
        let pattern = thresholds.classify(pre_sum, post_sum);

        let reaction = volume.as_ref().map(|v| {
            let prior: Vec<f64> = before
                .clone()
                .filter_map(|o| value_at(v, event.row, o))
                .collect();
            let current = v.get(event.row).copied().unwrap_or(f64::NAN);
            thresholds.volume_reaction(current, &prior)
        });

        *summary.counts.entry(pattern).or_insert(0) += 1;
        summary.events.push(ClassifiedEvent {
            date: event.date,
            row: event.row,
            pre_sum,
            post_sum,
            pattern,
            volume: reaction,
        });
    }

    debug!(
        events = summary.events.len(),
        dominant = ?summary.dominant(),
        "classified event patterns"
    );
    Ok(summary)
}
