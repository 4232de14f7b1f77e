//! Derived features over an [`AlignedTable`].
//!
//! Every feature is a pure function of the table: it reads existing columns
//! and returns a copy with one more column, leaving its input untouched, so
//! the same base table can feed any number of feature computations.
//!
//! Shifts and differences are row-based, not calendar-based. The aligned
//! table already has non-trading days removed, so "one row ahead" is the
//! next trading day.

pub mod range;
pub mod returns;
pub mod rolling;
pub mod scale;
pub mod shift;

pub use range::{IntradayRange, intraday_range};
pub use returns::{PercentChange, percent_change};
pub use rolling::{RollingQuantile, RollingQuantileConfig, rolling_quantile};
pub use scale::{MinMaxScale, ZScore, minmax_0_100, zscore};
pub use shift::{Shift, forward_target_name, forward_targets, shift};

use crate::{AlignedTable, Result};
use derive_more::Display;
use serde::Serialize;

/// Broad family a feature belongs to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeatureKind {
    /// Row-over-row percent change
    Change,
    /// Value moved forward or backward by whole rows
    Shift,
    /// Rescaling over the whole column
    Scale,
    /// Intraday price range
    Range,
    /// Trailing threshold
    Threshold,
}

/// A derived column computed from an aligned table.
pub trait Feature: Send + Sync + std::fmt::Debug {
    /// Output column name.
    fn name(&self) -> &str;

    /// Human-readable description of what this feature measures.
    fn description(&self) -> &str;

    /// Feature family.
    fn kind(&self) -> FeatureKind;

    /// Columns that must exist in the input table.
    fn required_columns(&self) -> Vec<&str>;

    /// Return a copy of `table` with the feature column appended.
    fn derive(&self, table: &AlignedTable) -> Result<AlignedTable>;
}

/// Metadata for feature introspection.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureInfo {
    /// Output column
    pub name: String,
    /// Description
    pub description: String,
    /// Family
    pub kind: FeatureKind,
    /// Input columns
    pub required_columns: Vec<String>,
}

/// Ordered list of features applied one after another.
///
/// Later features may read columns produced by earlier ones, e.g. a forward
/// shift of a percent-change column.
#[derive(Debug, Default)]
pub struct FeatureSet {
    features: Vec<Box<dyn Feature>>,
}

impl FeatureSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a feature.
    pub fn push(&mut self, feature: impl Feature + 'static) {
        self.features.push(Box::new(feature));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, feature: impl Feature + 'static) -> Self {
        self.push(feature);
        self
    }

    /// Apply every feature in order.
    pub fn apply(&self, table: &AlignedTable) -> Result<AlignedTable> {
        let mut current = table.clone();
        for feature in &self.features {
            current = feature.derive(&current)?;
        }
        Ok(current)
    }

    /// Output column names in application order.
    pub fn names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    /// Metadata for every feature.
    pub fn all_info(&self) -> Vec<FeatureInfo> {
        self.features
            .iter()
            .map(|f| FeatureInfo {
                name: f.name().to_string(),
                description: f.description().to_string(),
                kind: f.kind(),
                required_columns: f.required_columns().iter().map(|s| s.to_string()).collect(),
            })
            .collect()
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table() -> AlignedTable {
        let dates = (1..=5)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect();
        AlignedTable::from_columns(
            "t",
            dates,
            vec![
                ("close".to_string(), vec![100.0, 110.0, 99.0, 99.0, 108.9]),
                ("posts".to_string(), vec![1.0, 5.0, 3.0, 2.0, 4.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_feature_set_chains_outputs() {
        let set = FeatureSet::new()
            .with(PercentChange::new("close", "return"))
            .with(Shift::forward("return", 1, "return_t+1"))
            .with(MinMaxScale::new("posts", "posts_mm"));

        assert_eq!(set.names(), vec!["return", "return_t+1", "posts_mm"]);
        let base = table();
        let out = set.apply(&base).unwrap();

        let next = out.values("return_t+1").unwrap();
        assert!((next[0] - 10.0).abs() < 1e-9);
        assert!(next[4].is_nan());
        assert_eq!(out.values("posts_mm").unwrap()[1], 100.0);
        // input untouched
        assert_eq!(base.fields(), vec!["close", "posts"]);
    }

    #[test]
    fn test_feature_info() {
        let set = FeatureSet::new().with(IntradayRange::default());
        let info = set.all_info();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].kind, FeatureKind::Range);
        assert_eq!(info[0].required_columns, vec!["open", "high", "low"]);
        assert!(!set.is_empty());
    }
}
