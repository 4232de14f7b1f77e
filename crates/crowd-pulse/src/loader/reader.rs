//! CSV loader producing [`DatedSeries`].

use super::mapping::{ColumnMapping, FieldMapping};
use crate::{DateRange, DatedSeries, PulseError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use encoding_rs::EUC_KR;
use polars::prelude::*;
use serde::Serialize;
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, instrument, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Text of `bytes`: UTF-8 with an optional BOM, else CP949.
fn decode<'a>(source_id: &str, bytes: &'a [u8]) -> Result<Cow<'a, str>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(Cow::Borrowed(text));
    }
    let (text, had_errors) = EUC_KR.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(PulseError::Parse {
            source_id: source_id.to_string(),
            detail: "input is neither UTF-8 nor CP949".to_string(),
        });
    }
    debug!(source_id, "decoded input as CP949");
    Ok(text)
}

/// What happened to the rows of one input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Source identifier
    pub source_id: String,
    /// Data rows in the input
    pub rows_read: usize,
    /// Rows in the resulting series
    pub rows_kept: usize,
    /// Rows dropped because the date did not parse
    pub unparseable_dates: usize,
    /// Rows dropped because an earlier row had the same date
    pub duplicate_dates: usize,
    /// Rows outside the requested date range
    pub out_of_range: usize,
    /// Optional fields whose header was absent
    pub missing_optional: Vec<String>,
}

impl LoadReport {
    /// Rows dropped for data-quality reasons (not range trimming).
    pub const fn rows_dropped(&self) -> usize {
        self.unparseable_dates + self.duplicate_dates
    }
}

/// A loaded series together with its load report.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    /// The series
    pub series: DatedSeries,
    /// Row accounting for the load
    pub report: LoadReport,
}

/// Loads CSV input into a [`DatedSeries`] according to a [`ColumnMapping`].
///
/// The loader is a pure transform: nothing is cached between calls. Rows
/// whose date does not parse are dropped and counted; a date column with no
/// parseable value at all is fatal.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    mapping: ColumnMapping,
    range: Option<DateRange>,
}

impl CsvLoader {
    /// Create a loader for the given mapping.
    pub const fn new(mapping: ColumnMapping) -> Self {
        Self {
            mapping,
            range: None,
        }
    }

    /// Keep only rows inside `range`.
    pub const fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    /// The column mapping.
    pub const fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Load a CSV file. The path is used as source identifier.
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadedSeries> {
        let path = path.as_ref();
        let source_id = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|error| PulseError::Io {
            source_id: source_id.clone(),
            error,
        })?;
        self.load_bytes(&source_id, &bytes)
    }

    /// Load CSV content held in memory.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub fn load_bytes(&self, source_id: &str, bytes: &[u8]) -> Result<LoadedSeries> {
        let text = decode(source_id, bytes)?;
        if text.trim().is_empty() {
            return Err(PulseError::Parse {
                source_id: source_id.to_string(),
                detail: "input is empty".to_string(),
            });
        }

        let raw = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(Cursor::new(text.into_owned().into_bytes()))
            .finish()?;

        self.load_frame(source_id, &raw)
    }

    /// Convert an all-text frame (as read from CSV) into a series.
    fn load_frame(&self, source_id: &str, raw: &DataFrame) -> Result<LoadedSeries> {
        let mut report = LoadReport {
            source_id: source_id.to_string(),
            rows_read: raw.height(),
            ..Default::default()
        };

        let date_cells =
            text_column(raw, &self.mapping.date_column)?.ok_or_else(|| PulseError::Schema {
                source_id: source_id.to_string(),
                column: self.mapping.date_column.clone(),
            })?;

        let mut fields: Vec<(&FieldMapping, Vec<Option<String>>)> = Vec::new();
        for field in &self.mapping.fields {
            match text_column(raw, &field.source)? {
                Some(cells) => fields.push((field, cells)),
                None if field.required => {
                    return Err(PulseError::Schema {
                        source_id: source_id.to_string(),
                        column: field.source.clone(),
                    });
                }
                None => report.missing_optional.push(field.source.clone()),
            }
        }
        if fields.is_empty() {
            let candidates: Vec<_> = self
                .mapping
                .fields
                .iter()
                .map(|f| f.source.as_str())
                .collect();
            return Err(PulseError::Schema {
                source_id: source_id.to_string(),
                column: format!("one of [{}]", candidates.join(", ")),
            });
        }

        // (date, raw row index)
        let format = self.mapping.date_format.as_deref();
        let mut rows: Vec<(NaiveDate, usize)> = Vec::with_capacity(date_cells.len());
        for (idx, cell) in date_cells.iter().enumerate() {
            match cell.as_deref().and_then(|text| parse_date(text, format)) {
                Some(date) => rows.push((date, idx)),
                None => report.unparseable_dates += 1,
            }
        }
        if rows.is_empty() {
            return Err(PulseError::Parse {
                source_id: source_id.to_string(),
                detail: format!(
                    "date column '{}' has no parseable dates in {} rows",
                    self.mapping.date_column, report.rows_read
                ),
            });
        }

        // Stable sort keeps the first occurrence of a date ahead of its duplicates.
        rows.sort_by_key(|&(date, _)| date);
        let before = rows.len();
        rows.dedup_by_key(|&mut (date, _)| date);
        report.duplicate_dates = before - rows.len();

        if let Some(range) = self.range {
            let before = rows.len();
            rows.retain(|&(date, _)| range.contains(date));
            report.out_of_range = before - rows.len();
        }

        let columns = fields
            .iter()
            .map(|(field, cells)| {
                let missing = field.kind.missing_value();
                let values = rows
                    .iter()
                    .map(|&(_, idx)| {
                        cells[idx]
                            .as_deref()
                            .and_then(parse_number)
                            .unwrap_or(missing)
                    })
                    .collect();
                (field.name.clone(), values)
            })
            .collect();
        let dates = rows.iter().map(|&(date, _)| date).collect();

        let series = DatedSeries::new(source_id, dates, columns)?;
        report.rows_kept = series.len();

        if report.unparseable_dates > 0 {
            warn!(
                source = source_id,
                dropped = report.unparseable_dates,
                "dropped rows with unparseable dates"
            );
        }
        if report.duplicate_dates > 0 {
            warn!(
                source = source_id,
                dropped = report.duplicate_dates,
                "dropped rows with duplicate dates"
            );
        }
        debug!(
            source = source_id,
            rows = report.rows_kept,
            fields = series.fields().len(),
            "loaded series"
        );

        Ok(LoadedSeries { series, report })
    }
}

/// Cells of the column whose (trimmed) header equals `header`, as text.
fn text_column(raw: &DataFrame, header: &str) -> Result<Option<Vec<Option<String>>>> {
    let Some(column) = raw
        .get_columns()
        .iter()
        .find(|c| c.name().as_str().trim() == header)
    else {
        return Ok(None);
    };
    let text = column.cast(&DataType::String)?;
    Ok(Some(
        text.str()?
            .into_iter()
            .map(|cell| cell.map(str::to_string))
            .collect(),
    ))
}

/// Parse a calendar date, truncating date-times to their date.
pub(crate) fn parse_date(text: &str, format: Option<&str>) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(format) = format {
        return NaiveDate::parse_from_str(text, format)
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, format)
                    .ok()
                    .map(|dt| dt.date())
            });
    }

    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Parse a numeric cell, accepting thousands separators. Non-finite values count as missing.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|&c| c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
