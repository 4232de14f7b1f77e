//! Market-data collaborators supplying OHLCV series.
//!
//! A provider may return more days than requested (lead-in days for returns,
//! boundary days around the range). Callers re-trim after aligning and
//! deriving; nothing downstream assumes the supplier trimmed exactly.

use super::mapping::ColumnMapping;
use super::reader::CsvLoader;
use crate::{DateRange, DatedSeries, PulseError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Canonical OHLCV field names every provider must supply.
pub const OHLCV_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Supplier of daily OHLCV series for a ticker.
pub trait MarketDataProvider: Send + Sync + std::fmt::Debug {
    /// Short provider name for logs and error messages.
    fn name(&self) -> &str;

    /// Identity of the data behind this provider, used in cache keys.
    ///
    /// Two providers returning different bars for the same ticker must
    /// report different identities.
    fn cache_id(&self) -> String {
        self.name().to_string()
    }

    /// Fetch a series with the [`OHLCV_FIELDS`] covering at least `range`.
    ///
    /// The returned series' source identifier should name the ticker.
    fn fetch(&self, ticker: &str, range: DateRange) -> Result<DatedSeries>;
}

/// Fail with a schema error unless every OHLCV field is present.
pub(crate) fn ensure_ohlcv(series: &DatedSeries) -> Result<()> {
    match OHLCV_FIELDS.iter().find(|f| !series.has_field(f)) {
        Some(missing) => Err(PulseError::Schema {
            source_id: series.source().to_string(),
            column: (*missing).to_string(),
        }),
        None => Ok(()),
    }
}

/// Reads `<dir>/<ticker>.csv` files of daily bars.
#[derive(Debug, Clone)]
pub struct CsvMarketData {
    dir: PathBuf,
    mapping: ColumnMapping,
}

impl CsvMarketData {
    /// Provider over a directory of `Date,Open,High,Low,Close,Volume` files.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mapping: ColumnMapping::ohlcv(),
        }
    }

    /// Use a different header mapping. Fields must map onto [`OHLCV_FIELDS`].
    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Path of the file backing `ticker`.
    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{ticker}.csv"))
    }
}

impl MarketDataProvider for CsvMarketData {
    fn name(&self) -> &str {
        "csv"
    }

    fn cache_id(&self) -> String {
        format!("csv:{}", self.dir.display())
    }

    #[instrument(skip(self), fields(provider = "csv"))]
    fn fetch(&self, ticker: &str, range: DateRange) -> Result<DatedSeries> {
        let path = self.path_for(ticker);
        let loaded = CsvLoader::new(self.mapping.clone())
            .with_range(range)
            .load_path(&path)?;
        ensure_ohlcv(&loaded.series)?;
        debug!(ticker, rows = loaded.series.len(), "fetched price series");
        Ok(loaded.series)
    }
}

/// Ticker-to-series map held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketData {
    series: HashMap<String, DatedSeries>,
}

impl InMemoryMarketData {
    /// Empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the series for `ticker`, validating its OHLCV fields.
    pub fn insert(&mut self, ticker: impl Into<String>, series: DatedSeries) -> Result<()> {
        ensure_ohlcv(&series)?;
        self.series.insert(ticker.into(), series);
        Ok(())
    }
}

impl MarketDataProvider for InMemoryMarketData {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, ticker: &str, range: DateRange) -> Result<DatedSeries> {
        let series = self.series.get(ticker).ok_or_else(|| PulseError::Io {
            source_id: ticker.to_string(),
            error: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no price series registered for ticker {ticker}"),
            ),
        })?;
        series.trim(range)
    }
}
