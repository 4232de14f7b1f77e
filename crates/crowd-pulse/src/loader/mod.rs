//! Loaders - turn raw tabular input into [`DatedSeries`](crate::DatedSeries).
//!
//! Community metrics and OHLCV prices both arrive as CSV with
//! source-specific headers. A [`ColumnMapping`] names the date column and
//! maps each raw column onto a canonical field, and the [`CsvLoader`] does
//! the parsing. Market data comes through the [`MarketDataProvider`] seam so
//! the pipeline does not care whether prices are read from disk or held in
//! memory.

pub mod cache;
pub mod mapping;
pub mod market;
pub mod reader;

pub use cache::{CacheKey, SeriesCache};
pub use mapping::{ColumnMapping, FieldKind, FieldMapping};
pub use market::{CsvMarketData, InMemoryMarketData, MarketDataProvider, OHLCV_FIELDS};
pub use reader::{CsvLoader, LoadReport, LoadedSeries};
