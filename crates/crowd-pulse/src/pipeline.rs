//! End-to-end run: load, align, derive, analyze.
//!
//! Stages run in a fixed order:
//!
//! 1. fetch price bars for `[start - lead_days, end]`
//! 2. load every CSV source and apply its prefix
//! 3. inner-join price and joined sources, then left-join overlays
//! 4. derive returns, volume change, intraday range, forward targets and
//!    rolling thresholds on the lead-extended table
//! 5. trim to `[start, end]`
//! 6. rescale (min-max, z-score) over the trimmed table
//! 7. correlation, event study, pattern classification and the optional
//!    OLS regression
//!
//! Lead-in rows exist only so the first in-range return has a previous close;
//! they never reach the analytics.

use crate::analytics::{
    CorrelationMatrix, EventStudy, PatternSummary, Regression, classify_events,
    correlation_matrix, event_study, ols,
};
use crate::config::{PipelineConfig, SourceConfig};
use crate::features::{
    FeatureSet, IntradayRange, MinMaxScale, PercentChange, RollingQuantile, Shift, ZScore,
    forward_target_name,
};
use crate::loader::{CacheKey, CsvLoader, MarketDataProvider, OHLCV_FIELDS, SeriesCache};
use crate::{AlignedTable, DateRange, DatedSeries, Result, align, attach};
use serde::Serialize;
use tracing::{info, instrument};

/// Prefix of forward-return targets (`ret_t+1`, ...).
pub const RETURN_TARGET_PREFIX: &str = "ret";

/// Prefix of forward volume-change targets (`vol_t+1`, ...).
pub const VOLUME_TARGET_PREFIX: &str = "vol";

/// Output of [`Pipeline::run`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Ticker analyzed
    pub ticker: String,
    /// Requested analysis range
    pub range: DateRange,
    /// Rows in the trimmed aligned table
    pub rows: usize,
    /// Columns of the trimmed aligned table
    pub columns: Vec<String>,
    /// Predictor × forward-target correlations
    pub correlation: CorrelationMatrix,
    /// Quantile event study
    pub event_study: EventStudy,
    /// Per-event pattern classification
    pub patterns: PatternSummary,
    /// OLS fit, absent when disabled or when no target is available
    pub regression: Option<Regression>,
}

/// The aligned, derived and trimmed table plus the names of its community fields.
#[derive(Debug, Clone)]
pub struct PreparedTable {
    /// Table restricted to the analysis range
    pub table: AlignedTable,
    /// Fields contributed by CSV sources (joined and overlay)
    pub community_fields: Vec<String>,
    /// Fields contributed by inner-joined CSV sources only
    pub joined_fields: Vec<String>,
}

/// Stateless driver for a [`PipelineConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline;

impl Pipeline {
    /// Features applied before trimming, in application order.
    pub fn derivation_features(config: &PipelineConfig) -> FeatureSet {
        let mut set = FeatureSet::new().with(PercentChange::close_return());
        if config.features.volume_change {
            set.push(PercentChange::volume_change());
        }
        if config.features.intraday_range {
            set.push(IntradayRange::default());
        }
        for &k in &config.features.horizons {
            set.push(Shift::forward(
                "return",
                k,
                forward_target_name(RETURN_TARGET_PREFIX, k),
            ));
            if config.features.volume_change {
                set.push(Shift::forward(
                    "volume_change",
                    k,
                    forward_target_name(VOLUME_TARGET_PREFIX, k),
                ));
            }
        }
        for rolling in &config.features.rolling {
            set.push(RollingQuantile::new(
                rolling.column.clone(),
                rolling.output(),
                rolling.params,
            ));
        }
        set
    }

    /// Rescaling applied after trimming.
    pub fn scaling_features(config: &PipelineConfig) -> FeatureSet {
        let mut set = FeatureSet::new();
        for column in &config.features.minmax {
            set.push(MinMaxScale::new(column.clone(), format!("{column}_mm")));
        }
        for column in &config.features.zscore {
            set.push(ZScore::new(column.clone(), format!("{column}_z")));
        }
        set
    }

    /// Forward-target columns the config produces.
    pub fn forward_targets(config: &PipelineConfig) -> Vec<String> {
        let mut targets = Vec::new();
        for &k in &config.features.horizons {
            targets.push(forward_target_name(RETURN_TARGET_PREFIX, k));
        }
        if config.features.volume_change {
            for &k in &config.features.horizons {
                targets.push(forward_target_name(VOLUME_TARGET_PREFIX, k));
            }
        }
        targets
    }

    fn load_source(
        config: &PipelineConfig,
        source: &SourceConfig,
        fetch_range: DateRange,
        cache: &mut SeriesCache,
    ) -> Result<DatedSeries> {
        let path = config.resolve(&source.path);
        let key = CacheKey::ranged(path.display().to_string(), fetch_range);
        let series = cache.get_or_load(key, || {
            let loaded = CsvLoader::new(source.column_mapping()?)
                .with_range(fetch_range)
                .load_path(&path)?;
            info!(
                source = %source.name,
                read = loaded.report.rows_read,
                kept = loaded.report.rows_kept,
                dropped = loaded.report.rows_dropped(),
                "loaded community source"
            );
            Ok(loaded.series)
        })?;
        match &source.prefix {
            Some(prefix) => series.with_prefix(prefix),
            None => Ok(series),
        }
    }

    /// Run stages 1 to 6 and return the analysis-ready table.
    #[instrument(skip_all, fields(ticker = %config.ticker, range = %config.range))]
    pub fn prepare(
        config: &PipelineConfig,
        market: &dyn MarketDataProvider,
        cache: &mut SeriesCache,
    ) -> Result<PreparedTable> {
        config.validate()?;
        let range = config.range;
        let fetch_range = range.extend_back(config.lead_days);

        let price_key =
            CacheKey::ranged(format!("{}:{}", market.cache_id(), config.ticker), fetch_range);
        let price = cache
            .get_or_load(price_key, || market.fetch(&config.ticker, fetch_range))?
            .select(&OHLCV_FIELDS)?;

        let mut joined = vec![price];
        let mut overlays = Vec::new();
        for source in &config.sources {
            let series = Self::load_source(config, source, fetch_range, cache)?;
            if source.overlay {
                overlays.push(series);
            } else {
                joined.push(series);
            }
        }
        let joined_fields: Vec<String> = joined
            .iter()
            .skip(1)
            .flat_map(DatedSeries::fields)
            .collect();
        let community_fields: Vec<String> = joined_fields
            .iter()
            .cloned()
            .chain(overlays.iter().flat_map(DatedSeries::fields))
            .collect();

        let mut table = align(&joined)?;
        for overlay in &overlays {
            table = attach(&table, overlay)?;
        }

        let derived = Self::derivation_features(config).apply(&table)?;
        let trimmed = derived.trim(range)?;
        let table = Self::scaling_features(config).apply(&trimmed)?;

        info!(
            rows = table.len(),
            columns = table.fields().len(),
            "prepared aligned table"
        );
        Ok(PreparedTable {
            table,
            community_fields,
            joined_fields,
        })
    }

    /// Run the whole pipeline.
    ///
    /// An empty date intersection, before or after trimming, stops the run
    /// with [`PulseError::EmptyIntersection`](crate::PulseError::EmptyIntersection).
    #[instrument(skip_all, fields(ticker = %config.ticker))]
    pub fn run(
        config: &PipelineConfig,
        market: &dyn MarketDataProvider,
        cache: &mut SeriesCache,
    ) -> Result<PipelineReport> {
        let PreparedTable {
            table,
            community_fields,
            joined_fields,
        } = Self::prepare(config, market, cache)?;

        let predictors = if config.correlation.predictors.is_empty() {
            community_fields
        } else {
            config.correlation.predictors.clone()
        };
        let targets = if config.correlation.targets.is_empty() {
            Self::forward_targets(config)
        } else {
            config.correlation.targets.clone()
        };
        let correlation = correlation_matrix(&table, &predictors, &targets)?;

        let study = event_study(&table, &config.event_study)?;
        let volume = table.has_column("volume").then_some("volume");
        let patterns = classify_events(
            &table,
            &study,
            &config.event_study.return_column,
            volume,
            &config.patterns,
        )?;

        let regression = Self::regression(config, &table, &joined_fields)?;

        info!(
            events = study.events.len(),
            dominant = ?patterns.dominant(),
            "analysis complete"
        );
        Ok(PipelineReport {
            ticker: config.ticker.clone(),
            range: config.range,
            rows: table.len(),
            columns: table.fields(),
            correlation,
            event_study: study,
            patterns,
            regression,
        })
    }

    /// Fit the configured regression.
    ///
    /// The target defaults to the first forward return and the predictors to
    /// the inner-joined community fields.
    fn regression(
        config: &PipelineConfig,
        table: &AlignedTable,
        joined_fields: &[String],
    ) -> Result<Option<Regression>> {
        let settings = &config.regression;
        if !settings.enabled {
            return Ok(None);
        }
        let target = match &settings.target {
            Some(target) => target.clone(),
            None => match config.features.horizons.first() {
                Some(&k) => forward_target_name(RETURN_TARGET_PREFIX, k),
                None => return Ok(None),
            },
        };
        let predictors = if settings.predictors.is_empty() {
            joined_fields
        } else {
            settings.predictors.as_slice()
        };
        if predictors.is_empty() {
            return Ok(None);
        }
        ols(table, &target, predictors).map(Some)
    }
}
