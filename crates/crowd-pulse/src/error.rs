//! Error types for loading, aligning and analysing dated series.

use thiserror::Error;

/// Result type for crowd-pulse operations.
pub type Result<T> = std::result::Result<T, PulseError>;

/// Errors that can occur while building or analysing an aligned table.
///
/// Fatal conditions carry the source identifier (file path or ticker) so an
/// operator can fix the offending configuration. Insufficient data for a
/// statistic is not an error: it shows up as NaN in the result instead.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Required column missing from an input table
    #[error("Schema error in {source_id}: missing required column '{column}'")]
    Schema {
        /// File path, ticker or other source identifier
        source_id: String,
        /// The missing column
        column: String,
    },

    /// Fatal date or numeric parsing failure
    #[error("Parse error in {source_id}: {detail}")]
    Parse {
        /// File path, ticker or other source identifier
        source_id: String,
        /// What could not be parsed
        detail: String,
    },

    /// The date intersection of the inputs is empty
    #[error("No data in range: no common dates across {sources}")]
    EmptyIntersection {
        /// Each participating source with its date span
        sources: String,
    },

    /// Two inputs provide the same field name
    #[error("Column '{column}' is provided by both {first} and {second}; prefix or rename before aligning")]
    ColumnCollision {
        /// The colliding field
        column: String,
        /// Source that contributed the field first
        first: String,
        /// Source that contributed it again
        second: String,
    },

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },

    /// Column referenced by a feature or statistic is not in the table
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Parameter outside its valid domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O failure while reading a source
    #[error("I/O error reading {source_id}: {error}")]
    Io {
        /// File path, ticker or other source identifier
        source_id: String,
        /// Underlying I/O error
        #[source]
        error: std::io::Error,
    },

    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl PulseError {
    /// Whether the error means "no data for this range" rather than a broken input.
    pub const fn is_empty_intersection(&self) -> bool {
        matches!(self, Self::EmptyIntersection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_messages_name_the_source() {
        let err = PulseError::Schema {
            source_id: "data/samsung.csv".to_string(),
            column: "날짜".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("data/samsung.csv"));
        assert!(msg.contains("날짜"));
    }

    #[test]
    fn test_io_error_keeps_cause() {
        let err = PulseError::Io {
            source_id: "prices/005930.csv".to_string(),
            error: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.source().is_some());
        assert!(!err.is_empty_intersection());
    }
}
