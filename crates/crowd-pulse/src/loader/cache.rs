//! Explicit cache for loaded series.
//!
//! Keys are `(source, optional range)`. There is no eviction: loaded
//! historical data is immutable, so entries stay until the caller
//! invalidates them. Lookups hand out copies, so one session's table can
//! never be mutated through another's cache entry.

use crate::{DateRange, DatedSeries, Result};
use std::collections::HashMap;
use tracing::debug;

/// Cache key: source identity plus the requested range, if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// File path, ticker or other source identity
    pub source: String,
    /// Requested range; `None` for whole-file loads
    pub range: Option<DateRange>,
}

impl CacheKey {
    /// Key for a whole-source load.
    pub fn whole(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            range: None,
        }
    }

    /// Key for a range-bounded load.
    pub fn ranged(source: impl Into<String>, range: DateRange) -> Self {
        Self {
            source: source.into(),
            range: Some(range),
        }
    }
}

/// In-process memo of loaded series.
#[derive(Debug, Default)]
pub struct SeriesCache {
    entries: HashMap<CacheKey, DatedSeries>,
    hits: u64,
    misses: u64,
}

impl SeriesCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached copy for `key`, counting the hit or miss.
    pub fn get(&mut self, key: &CacheKey) -> Option<DatedSeries> {
        match self.entries.get(key) {
            Some(series) => {
                self.hits += 1;
                debug!(source = %key.source, "series cache hit");
                Some(series.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store `series` under `key`, replacing any previous entry.
    pub fn insert(&mut self, key: CacheKey, series: DatedSeries) {
        self.entries.insert(key, series);
    }

    /// Return the cached series or load, store and return it.
    ///
    /// Load errors are passed through and nothing is cached for the key.
    pub fn get_or_load<F>(&mut self, key: CacheKey, load: F) -> Result<DatedSeries>
    where
        F: FnOnce() -> Result<DatedSeries>,
    {
        if let Some(series) = self.get(&key) {
            return Ok(series);
        }
        let series = load()?;
        self.entries.insert(key, series.clone());
        Ok(series)
    }

    /// Drop one entry; returns whether it existed.
    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry whose source is `source`, whatever its range.
    pub fn invalidate_source(&mut self, source: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.source != source);
        before - self.entries.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub const fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
