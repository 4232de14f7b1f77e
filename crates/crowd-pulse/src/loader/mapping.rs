//! Column mappings from raw CSV headers to canonical field names.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// How missing or non-numeric cells of a field are filled.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Community activity count; missing activity is zero activity.
    #[default]
    Count,
    /// Price or volume; missing stays NaN so returns are never corrupted.
    Price,
    /// Precomputed opaque score such as an overheat index; missing stays NaN.
    Index,
}

impl FieldKind {
    /// Value substituted for a missing or unparseable cell.
    pub const fn missing_value(self) -> f64 {
        match self {
            Self::Count => 0.0,
            Self::Price | Self::Index => f64::NAN,
        }
    }
}

fn default_required() -> bool {
    true
}

/// One raw column kept by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Header in the raw file
    pub source: String,
    /// Canonical field name in the loaded series
    pub name: String,
    /// Fill policy for missing cells
    #[serde(default)]
    pub kind: FieldKind,
    /// Whether a missing header is a schema error (default: true)
    #[serde(default = "default_required")]
    pub required: bool,
}

impl FieldMapping {
    /// Required field.
    pub fn new(source: impl Into<String>, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// Field that is skipped when its header is absent.
    pub fn optional(source: impl Into<String>, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::new(source, name, kind)
        }
    }
}

/// Maps the raw columns of one source onto a dated series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Header of the date column
    pub date_column: String,
    /// Explicit chrono format for the date column; common formats are tried when absent
    #[serde(default)]
    pub date_format: Option<String>,
    /// Fields to keep
    pub fields: Vec<FieldMapping>,
}

impl ColumnMapping {
    /// Mapping with the given date column and no fields yet.
    pub fn new(date_column: impl Into<String>) -> Self {
        Self {
            date_column: date_column.into(),
            date_format: None,
            fields: Vec::new(),
        }
    }

    /// Add a field mapping.
    pub fn field(mut self, field: FieldMapping) -> Self {
        self.fields.push(field);
        self
    }

    /// Fix the date format instead of trying the common ones.
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    /// Daily community aggregates with Korean headers
    /// (`날짜`, `게시글수`, `조회수`, `댓글수`, `좋아요수`).
    ///
    /// Count headers are optional individually; the loader still requires at
    /// least one of them to be present.
    pub fn daily_counts() -> Self {
        Self::new("날짜")
            .field(FieldMapping::optional("게시글수", "posts", FieldKind::Count))
            .field(FieldMapping::optional("조회수", "views", FieldKind::Count))
            .field(FieldMapping::optional("댓글수", "comments", FieldKind::Count))
            .field(FieldMapping::optional("좋아요수", "likes", FieldKind::Count))
    }

    /// Fear-greed / overheat index files (`date`, `fng_index`).
    pub fn fear_greed() -> Self {
        Self::new("date").field(FieldMapping::new("fng_index", "overheat", FieldKind::Index))
    }

    /// OHLCV price files (`Date`, `Open`, `High`, `Low`, `Close`, `Volume`).
    pub fn ohlcv() -> Self {
        Self::new("Date")
            .field(FieldMapping::new("Open", "open", FieldKind::Price))
            .field(FieldMapping::new("High", "high", FieldKind::Price))
            .field(FieldMapping::new("Low", "low", FieldKind::Price))
            .field(FieldMapping::new("Close", "close", FieldKind::Price))
            .field(FieldMapping::new("Volume", "volume", FieldKind::Price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_value_policy() {
        assert_eq!(FieldKind::Count.missing_value(), 0.0);
        assert!(FieldKind::Price.missing_value().is_nan());
        assert!(FieldKind::Index.missing_value().is_nan());
    }

    #[test]
    fn test_presets() {
        let daily = ColumnMapping::daily_counts();
        assert_eq!(daily.date_column, "날짜");
        assert_eq!(daily.fields.len(), 4);
        assert!(daily.fields.iter().all(|f| !f.required && f.kind == FieldKind::Count));

        let ohlcv = ColumnMapping::ohlcv();
        let names: Vec<_> = ohlcv.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["open", "high", "low", "close", "volume"]);
    }

    #[test]
    fn test_mapping_from_toml_defaults() {
        let mapping: ColumnMapping = toml::from_str(
            r#"
            date_column = "day"
            [[fields]]
            source = "cnt"
            name = "posts"
            "#,
        )
        .unwrap();
        assert_eq!(mapping.fields[0].kind, FieldKind::Count);
        assert!(mapping.fields[0].required);
        assert!(mapping.date_format.is_none());
    }
}
