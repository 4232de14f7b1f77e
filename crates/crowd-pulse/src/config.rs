//! Pipeline configuration loaded from TOML.
//!
//! ```toml
//! ticker = "005930"
//! range = { start = "2024-01-01", end = "2024-06-30" }
//!
//! [market]
//! dir = "prices"
//!
//! [[sources]]
//! name = "dc"
//! path = "dc_daily.csv"
//! preset = "daily-counts"
//! prefix = "dc_"
//!
//! [[sources]]
//! name = "fng"
//! path = "fng.csv"
//! preset = "fear-greed"
//! overlay = true
//!
//! [event_study]
//! metric = "dc_views"
//! quantile = 0.9
//! window = { start = -3, end = 4 }
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use crate::analytics::{EventStudyConfig, PatternThresholds, RegressionConfig};
use crate::features::RollingQuantileConfig;
use crate::loader::ColumnMapping;
use crate::{DateRange, PulseError, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Named column mappings for the file shapes the loader knows.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingPreset {
    /// [`ColumnMapping::daily_counts`]
    #[display("daily-counts")]
    DailyCounts,
    /// [`ColumnMapping::fear_greed`]
    #[display("fear-greed")]
    FearGreed,
    /// [`ColumnMapping::ohlcv`]
    #[display("ohlcv")]
    Ohlcv,
}

impl MappingPreset {
    /// The mapping this preset stands for.
    pub fn mapping(self) -> ColumnMapping {
        match self {
            Self::DailyCounts => ColumnMapping::daily_counts(),
            Self::FearGreed => ColumnMapping::fear_greed(),
            Self::Ohlcv => ColumnMapping::ohlcv(),
        }
    }
}

impl FromStr for MappingPreset {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily-counts" => Ok(Self::DailyCounts),
            "fear-greed" => Ok(Self::FearGreed),
            "ohlcv" => Ok(Self::Ohlcv),
            other => Err(PulseError::Config(format!("unknown mapping preset '{other}'"))),
        }
    }
}

/// Where price bars come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Directory holding `<ticker>.csv` files
    pub dir: PathBuf,
    /// Header mapping for those files; OHLCV preset when absent
    pub mapping: Option<ColumnMapping>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("prices"),
            mapping: None,
        }
    }
}

/// One community (or overlay) CSV input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Short name used in logs
    pub name: String,
    /// CSV path
    pub path: PathBuf,
    /// Named mapping, used when `mapping` is absent
    #[serde(default)]
    pub preset: Option<MappingPreset>,
    /// Explicit mapping
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
    /// Prefix added to every field, to keep sources apart after the join
    #[serde(default)]
    pub prefix: Option<String>,
    /// Left-join onto the aligned table instead of intersecting with it
    #[serde(default)]
    pub overlay: bool,
}

impl SourceConfig {
    /// Resolve the column mapping: explicit mapping first, then preset.
    pub fn column_mapping(&self) -> Result<ColumnMapping> {
        match (&self.mapping, self.preset) {
            (Some(mapping), _) => Ok(mapping.clone()),
            (None, Some(preset)) => Ok(preset.mapping()),
            (None, None) => Err(PulseError::Config(format!(
                "source '{}' needs either `mapping` or `preset`",
                self.name
            ))),
        }
    }
}

/// A trailing quantile threshold column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingFeatureConfig {
    /// Input column
    pub column: String,
    /// Window and quantile
    #[serde(flatten)]
    pub params: RollingQuantileConfig,
}

impl RollingFeatureConfig {
    /// Output column name, e.g. `dc_views_q90_w20`.
    pub fn output(&self) -> String {
        format!(
            "{}_q{:.0}_w{}",
            self.column,
            self.params.quantile * 100.0,
            self.params.window
        )
    }
}

/// Derived-feature settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Forward horizons in rows for `ret_t+k` / `vol_t+k`
    pub horizons: Vec<usize>,
    /// Add `volume_change` and its forward targets
    pub volume_change: bool,
    /// Add `intraday_range`
    pub intraday_range: bool,
    /// Columns rescaled to 0..100 as `{column}_mm`
    pub minmax: Vec<String>,
    /// Columns z-scored as `{column}_z`
    pub zscore: Vec<String>,
    /// Trailing quantile thresholds
    pub rolling: Vec<RollingFeatureConfig>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            horizons: vec![1, 3, 4],
            volume_change: true,
            intraday_range: true,
            minmax: Vec::new(),
            zscore: Vec::new(),
            rolling: Vec::new(),
        }
    }
}

/// Which columns to correlate.
///
/// Empty lists mean "every community field" and "every forward target".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Predictor columns
    pub predictors: Vec<String>,
    /// Target columns
    pub targets: Vec<String>,
}

fn default_lead_days() -> u64 {
    14
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ticker passed to the market-data provider
    pub ticker: String,
    /// Analysis range, inclusive
    pub range: DateRange,
    /// Calendar days of price history fetched before `range.start`
    #[serde(default = "default_lead_days")]
    pub lead_days: u64,
    /// Price source
    #[serde(default)]
    pub market: MarketConfig,
    /// Community and overlay inputs
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Derived features
    #[serde(default)]
    pub features: FeatureConfig,
    /// Correlation columns
    #[serde(default)]
    pub correlation: CorrelationConfig,
    /// Event study
    #[serde(default)]
    pub event_study: EventStudyConfig,
    /// Pattern classifier cutoffs
    #[serde(default)]
    pub patterns: PatternThresholds,
    /// OLS of a forward return on community fields
    #[serde(default)]
    pub regression: RegressionConfig,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl PipelineConfig {
    /// Minimal config for `ticker` over `range` with default sections.
    pub fn new(ticker: impl Into<String>, range: DateRange) -> Self {
        Self {
            ticker: ticker.into(),
            range,
            lead_days: default_lead_days(),
            market: MarketConfig::default(),
            sources: Vec::new(),
            features: FeatureConfig::default(),
            correlation: CorrelationConfig::default(),
            event_study: EventStudyConfig::default(),
            patterns: PatternThresholds::default(),
            regression: RegressionConfig::default(),
            base_dir: None,
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| PulseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file; relative paths inside resolve against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| PulseError::Io {
            source_id: path.display().to_string(),
            error,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Resolve `path` against the config file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PulseError::Config(e.to_string()))
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        DateRange::new(self.range.start, self.range.end)?;
        if self.ticker.trim().is_empty() {
            return Err(PulseError::Config("ticker must not be empty".to_string()));
        }
        if self.features.horizons.contains(&0) {
            return Err(PulseError::Config(
                "forward horizons must be at least 1 row".to_string(),
            ));
        }
        for source in &self.sources {
            source.column_mapping()?;
        }
        if !self.sources.is_empty() && self.sources.iter().all(|s| s.overlay) {
            return Err(PulseError::Config(
                "at least one source must be joined (overlay = false)".to_string(),
            ));
        }
        self.event_study.validate()
    }
}
