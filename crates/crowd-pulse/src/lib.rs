#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/crowd-pulse/crowd-pulse/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod align;
pub mod analytics;
pub mod config;
pub mod error;
pub mod features;
pub mod loader;
pub mod pipeline;
pub mod series;
pub mod stats;

// Re-export core types
pub use align::{align, attach};
pub use analytics::{
    CorrelationMatrix, EventStudy, EventStudyConfig, OffsetWindow, PatternSummary,
    PatternThresholds, PricePattern, Regression, RegressionConfig, VolumeReaction,
    correlation_matrix, event_study, ols, pearson,
};
pub use config::PipelineConfig;
pub use error::{PulseError, Result};
pub use features::{Feature, FeatureKind, FeatureSet};
pub use loader::{
    ColumnMapping, CsvLoader, FieldKind, FieldMapping, LoadReport, LoadedSeries,
    MarketDataProvider, SeriesCache,
};
pub use pipeline::{Pipeline, PipelineReport};
pub use series::{AlignedTable, DATE_COLUMN, DateRange, DatedSeries};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
