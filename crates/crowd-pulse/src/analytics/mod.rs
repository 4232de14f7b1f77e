//! Correlation, regression and event-study analytics over an
//! [`AlignedTable`](crate::AlignedTable).
//!
//! Insufficient data is never an error here. Undefined statistics come back
//! as NaN together with the observation count that produced them, so short
//! date ranges degrade to empty results instead of failing the run.

pub mod correlation;
pub mod event_study;
pub mod pattern;
pub mod regression;

pub use correlation::{CorrelationEntry, CorrelationMatrix, correlation_matrix, pearson};
pub use event_study::{Event, EventStudy, EventStudyConfig, OffsetMean, OffsetWindow, event_study};
pub use pattern::{
    ClassifiedEvent, PatternSummary, PatternThresholds, PricePattern, VolumeReaction,
    classify_events,
};
pub use regression::{INTERCEPT, Regression, RegressionConfig, RegressionTerm, ols};
