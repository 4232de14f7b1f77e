//! End-to-end runs over CSV text and an in-memory price provider.

use approx::assert_relative_eq;
use chrono::{Datelike, Days, NaiveDate};
use crowd_pulse::loader::{CsvMarketData, InMemoryMarketData, OHLCV_FIELDS};
use crowd_pulse::{
    ColumnMapping, CsvLoader, DateRange, DatedSeries, Pipeline, PipelineConfig, PulseError,
    SeriesCache, align,
};
use std::path::PathBuf;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .collect()
}

fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    days(start, end)
        .into_iter()
        .filter(|d| d.weekday().number_from_monday() <= 5)
        .collect()
}

/// Daily bars on weekdays of Dec 2023 through early Feb 2024.
fn price_series() -> DatedSeries {
    let dates = weekdays(date(2023, 12, 1), date(2024, 2, 9));
    let n = dates.len();
    let close: Vec<f64> = (0..n)
        .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.3)
        .collect();
    let open: Vec<f64> = close.iter().map(|c| c - 0.5).collect();
    let high: Vec<f64> = close.iter().map(|c| c + 1.5).collect();
    let low: Vec<f64> = close.iter().map(|c| c - 2.0).collect();
    let volume: Vec<f64> = (0..n).map(|i| 1000.0 + (i % 4) as f64 * 50.0).collect();

    let columns = OHLCV_FIELDS
        .iter()
        .map(|f| f.to_string())
        .zip([open, high, low, close, volume])
        .collect();
    DatedSeries::new("005930", dates, columns).unwrap()
}

fn posts_on(day: NaiveDate) -> u32 {
    if day == date(2024, 1, 17) {
        500
    } else {
        10 + day.day() % 7
    }
}

fn thousands(value: u32) -> String {
    if value >= 1000 {
        format!("\"{},{:03}\"", value / 1000, value % 1000)
    } else {
        value.to_string()
    }
}

/// Korean-header community CSV with a BOM, one bad date and one duplicate.
fn community_csv() -> String {
    let mut text = String::from("\u{feff}날짜,게시글수,조회수,댓글수,좋아요수\n");
    for day in days(date(2023, 12, 20), date(2024, 1, 31)) {
        let posts = posts_on(day);
        text.push_str(&format!(
            "{day},{posts},{},{},2\n",
            thousands(posts * 100),
            posts % 5
        ));
    }
    text.push_str("not-a-date,1,1,1,1\n");
    text.push_str("2024-01-02,999,999,999,2\n");
    text
}

fn fear_greed_csv() -> String {
    let mut text = String::from("date,fng_index\n");
    for day in days(date(2024, 1, 1), date(2024, 1, 31)) {
        if day.day() % 2 == 0 {
            text.push_str(&format!("{day},{}\n", 40 + day.day()));
        }
    }
    text
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("crowd-pulse-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn market() -> InMemoryMarketData {
    let mut market = InMemoryMarketData::new();
    market.insert("005930", price_series()).unwrap();
    market
}

#[test]
fn test_loader_report_and_alignment() {
    let loaded = CsvLoader::new(ColumnMapping::daily_counts())
        .load_bytes("dc.csv", community_csv().as_bytes())
        .unwrap();

    assert_eq!(loaded.report.unparseable_dates, 1);
    assert_eq!(loaded.report.duplicate_dates, 1);
    assert_eq!(loaded.report.rows_kept, 43);
    assert_eq!(loaded.series.fields(), vec!["posts", "views", "comments", "likes"]);

    let jan2 = loaded
        .series
        .dates()
        .unwrap()
        .iter()
        .position(|d| *d == date(2024, 1, 2))
        .unwrap();
    // first occurrence wins; thousands separators parse
    assert_eq!(loaded.series.values("posts").unwrap()[jan2], 12.0);
    assert_eq!(loaded.series.values("views").unwrap()[jan2], 1200.0);

    let january = DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
    let table = align(&[
        price_series().trim(january).unwrap(),
        loaded.series.with_prefix("dc_").unwrap(),
    ])
    .unwrap();
    assert_eq!(table.len(), 23);
    assert_eq!(table.dates().unwrap(), weekdays(date(2024, 1, 1), date(2024, 1, 31)));
}

#[test]
fn test_missing_columns() {
    let no_date = CsvLoader::new(ColumnMapping::daily_counts())
        .load_bytes("broken.csv", "게시글수,조회수\n1,2\n".as_bytes())
        .unwrap_err();
    assert!(
        matches!(no_date, PulseError::Schema { ref source_id, ref column } if source_id == "broken.csv" && column == "날짜")
    );

    let no_volume = CsvLoader::new(ColumnMapping::ohlcv())
        .load_bytes("005930", "Date,Open,High,Low,Close\n2024-01-02,1,1,1,1\n".as_bytes())
        .unwrap_err();
    assert!(
        matches!(no_volume, PulseError::Schema { ref source_id, ref column } if source_id == "005930" && column == "Volume")
    );
}

#[test]
fn test_full_pipeline() {
    let dir = scratch_dir("full");
    let dc = dir.join("dc_daily.csv");
    let fng = dir.join("fng.csv");
    std::fs::write(&dc, community_csv()).unwrap();
    std::fs::write(&fng, fear_greed_csv()).unwrap();

    let toml = format!(
        r#"
ticker = "005930"
range = {{ start = "2024-01-01", end = "2024-01-31" }}

[[sources]]
name = "dc"
path = '{}'
preset = "daily-counts"
prefix = "dc_"

[[sources]]
name = "fng"
path = '{}'
preset = "fear-greed"
overlay = true

[features]
minmax = ["dc_posts"]
zscore = ["dc_views"]

[event_study]
metric = "dc_posts"
quantile = 0.99

[regression]
predictors = ["dc_posts", "dc_comments"]
"#,
        dc.display(),
        fng.display()
    );
    let config = PipelineConfig::from_toml_str(&toml).unwrap();
    let mut cache = SeriesCache::new();
    let report = Pipeline::run(&config, &market(), &mut cache).unwrap();

    assert_eq!(report.rows, 23);
    for column in [
        "dc_posts",
        "overheat",
        "return",
        "intraday_range",
        "ret_t+1",
        "vol_t+4",
        "dc_posts_mm",
        "dc_views_z",
    ] {
        assert!(
            report.columns.iter().any(|c| c == column),
            "missing column {column}"
        );
    }

    // correlation: every community field against every forward target
    let corr = &report.correlation;
    assert_eq!(
        corr.predictors,
        vec!["dc_posts", "dc_views", "dc_comments", "dc_likes", "overheat"]
    );
    assert_eq!(corr.targets.len(), 6);
    assert_eq!(corr.entries.len(), 30);
    assert!(!corr.get("dc_likes", "ret_t+1").unwrap().is_defined());
    let posts_next = corr.get("dc_posts", "ret_t+1").unwrap();
    assert!(posts_next.is_defined());
    // the last row has no next-day return
    assert_eq!(posts_next.observations, 22);
    assert!(corr.get("overheat", "ret_t+1").unwrap().observations < 23);

    // the Jan 17 spike is the only event
    let study = &report.event_study;
    assert_eq!(study.events.len(), 1);
    assert_eq!(study.events[0].date, date(2024, 1, 17));
    assert_eq!(study.profile.len(), 8);
    assert!(study.profile.iter().all(|p| p.observations == 1));

    assert_eq!(report.patterns.events.len(), 1);
    assert!(report.patterns.dominant().is_some());

    // views are posts * 100 and likes are constant, so the fit uses two fields
    let regression = report.regression.as_ref().unwrap();
    assert_eq!(regression.target, "ret_t+1");
    assert_eq!(regression.observations, 22);
    assert!(regression.is_defined());
    let names: Vec<&str> = regression.terms.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["const", "dc_posts", "dc_comments"]);
    assert!((0.0..=1.0).contains(&regression.r_squared));

    // second run is served from the cache
    let again = Pipeline::run(&config, &market(), &mut cache).unwrap();
    assert_eq!(again.rows, report.rows);
    assert_eq!(cache.stats().0, 3);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["ticker"], "005930");
    assert!(json["correlation"]["entries"].as_array().unwrap().len() == 30);
    assert_eq!(json["regression"]["observations"], 22);

    std::fs::remove_dir_all(&dir).ok();
}

fn price_csv(scale: f64) -> String {
    let prices = price_series();
    let mut text = String::from("Date,Open,High,Low,Close,Volume\n");
    for (i, day) in prices.dates().unwrap().iter().enumerate() {
        let row: Vec<String> = OHLCV_FIELDS
            .iter()
            .map(|f| (prices.values(f).unwrap()[i] * scale).to_string())
            .collect();
        text.push_str(&format!("{day},{}\n", row.join(",")));
    }
    text
}

#[test]
fn test_price_directories_do_not_share_cache_entries() {
    let dir = scratch_dir("dirs");
    let dc = dir.join("dc.csv");
    std::fs::write(&dc, community_csv()).unwrap();
    let mut closes = Vec::new();
    let mut cache = SeriesCache::new();
    let mut config = PipelineConfig::new(
        "005930",
        DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap(),
    );
    config.sources.push(
        toml::from_str(&format!(
            "name = \"dc\"\npath = '{}'\npreset = \"daily-counts\"",
            dc.display()
        ))
        .unwrap(),
    );

    for (name, scale) in [("krx", 1.0), ("adjusted", 2.0)] {
        let prices = dir.join(name);
        std::fs::create_dir_all(&prices).unwrap();
        std::fs::write(prices.join("005930.csv"), price_csv(scale)).unwrap();
        let market = CsvMarketData::new(&prices);
        let prepared = Pipeline::prepare(&config, &market, &mut cache).unwrap();
        closes.push(prepared.table.values("close").unwrap()[0]);
    }

    assert_relative_eq!(closes[1], closes[0] * 2.0, epsilon = 1e-9);
    // one price entry per directory, one shared community entry
    assert_eq!(cache.len(), 3);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_first_in_range_return_uses_lead_in_day() {
    let dir = scratch_dir("lead");
    let dc = dir.join("dc.csv");
    std::fs::write(&dc, community_csv()).unwrap();

    let mut config = PipelineConfig::new(
        "005930",
        DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap(),
    );
    config.sources.push(
        toml::from_str(&format!(
            "name = \"dc\"\npath = '{}'\npreset = \"daily-counts\"",
            dc.display()
        ))
        .unwrap(),
    );

    let prepared = Pipeline::prepare(&config, &market(), &mut SeriesCache::new()).unwrap();
    let table = prepared.table;
    assert_eq!(table.dates().unwrap()[0], date(2024, 1, 1));

    let prices = price_series();
    let dates = prices.dates().unwrap();
    let close = prices.values("close").unwrap();
    let jan1 = dates.iter().position(|d| *d == date(2024, 1, 1)).unwrap();
    let expected = (close[jan1] - close[jan1 - 1]) / close[jan1 - 1] * 100.0;
    assert_relative_eq!(table.values("return").unwrap()[0], expected, epsilon = 1e-9);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_disjoint_months_stop_the_run() {
    let dir = scratch_dir("disjoint");
    let dc = dir.join("feb.csv");
    let mut text = String::from("날짜,게시글수\n");
    for day in days(date(2024, 2, 1), date(2024, 2, 28)) {
        text.push_str(&format!("{day},5\n"));
    }
    std::fs::write(&dc, text).unwrap();

    let mut config = PipelineConfig::new(
        "005930",
        DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap(),
    );
    config.sources.push(
        toml::from_str(&format!(
            "name = \"feb\"\npath = '{}'\npreset = \"daily-counts\"",
            dc.display()
        ))
        .unwrap(),
    );

    let err = Pipeline::run(&config, &market(), &mut SeriesCache::new()).unwrap_err();
    assert!(err.is_empty_intersection());
    assert!(err.to_string().contains("005930"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_lead_extension_reaches_back_two_weeks() {
    let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
    let extended = range.extend_back(14);
    assert_eq!(extended.start, date(2024, 1, 1).checked_sub_days(Days::new(14)).unwrap());
}
