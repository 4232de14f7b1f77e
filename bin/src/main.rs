//! CLI for the crowd-pulse community/market analytics library.
//!
//! ```bash
//! # full run: load, align, derive, correlate, event study
//! crowd-pulse analyze --config pulse.toml
//! crowd-pulse analyze --config pulse.toml --format json > report.json
//!
//! # check how a single CSV loads
//! crowd-pulse inspect data/dc_daily.csv --preset daily-counts
//!
//! # list the derived columns a config produces
//! crowd-pulse features --config pulse.toml
//! ```

mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crowd_pulse::config::MappingPreset;
use crowd_pulse::features::FeatureInfo;
use crowd_pulse::loader::CsvMarketData;
use crowd_pulse::{CsvLoader, Pipeline, PipelineConfig, PipelineReport, SeriesCache};
use logging::{LogConfig, LogFormat, init_logging};
use std::path::{Path, PathBuf};
use tracing::error;

#[derive(Parser)]
#[command(name = "crowd-pulse")]
#[command(about = "Community sentiment vs. price: alignment, features, event studies", long_about = None)]
#[command(version)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log line layout
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print the report
    Analyze {
        /// Pipeline config (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Report layout
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Load one CSV and print its load report
    Inspect {
        /// CSV file
        path: PathBuf,

        /// Column mapping
        #[arg(short, long, value_enum, default_value_t = Preset::DailyCounts)]
        preset: Preset,
    },

    /// List the features a config derives
    Features {
        /// Pipeline config (TOML)
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable tables
    Pretty,
    /// serde_json report
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// 날짜, 게시글수, 조회수, 댓글수, 좋아요수
    DailyCounts,
    /// date, fng_index
    FearGreed,
    /// Date, Open, High, Low, Close, Volume
    Ohlcv,
}

impl From<Preset> for MappingPreset {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::DailyCounts => Self::DailyCounts,
            Preset::FearGreed => Self::FearGreed,
            Preset::Ohlcv => Self::Ohlcv,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&LogConfig::new(&cli.log_level, cli.log_format)) {
        eprintln!("failed to initialize logging: {e}");
    }

    let result = match cli.command {
        Commands::Analyze { config, format } => analyze(&config, format),
        Commands::Inspect { path, preset } => inspect(&path, preset),
        Commands::Features { config } => list_features(&config),
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::from_path(path)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn analyze(config_path: &Path, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let market = CsvMarketData::new(config.resolve(&config.market.dir));
    let market = match &config.market.mapping {
        Some(mapping) => market.with_mapping(mapping.clone()),
        None => market,
    };
    let mut cache = SeriesCache::new();

    let report = match Pipeline::run(&config, &market, &mut cache) {
        Ok(report) => report,
        Err(e) if e.is_empty_intersection() => {
            println!("No data in range {} for {}: {e}", config.range, config.ticker);
            return Ok(());
        }
        Err(e) => return Err(e).context("pipeline failed"),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Pretty => print_report(&report),
    }
    Ok(())
}

fn fmt_value(value: f64) -> String {
    if value.is_finite() {
        format!("{value:>8.3}")
    } else {
        format!("{:>8}", "n/a")
    }
}

fn print_report(report: &PipelineReport) {
    println!("Ticker: {}  Range: {}  Rows: {}", report.ticker, report.range, report.rows);
    println!("Columns: {}\n", report.columns.join(", "));

    let corr = &report.correlation;
    println!("Correlation (pairwise complete, n in brackets)");
    print!("{:<20}", "");
    for target in &corr.targets {
        print!("{target:>14}");
    }
    println!();
    for predictor in &corr.predictors {
        print!("{predictor:<20}");
        for target in &corr.targets {
            match corr.get(predictor, target) {
                Some(e) => print!("{} [{:>3}]", fmt_value(e.coefficient), e.observations),
                None => print!("{:>14}", "-"),
            }
        }
        println!();
    }

    let study = &report.event_study;
    println!(
        "\nEvent study: {} >= q{} ({}), {} events, window {}",
        study.metric,
        study.quantile,
        fmt_value(study.threshold).trim(),
        study.events.len(),
        study.window
    );
    for point in &study.profile {
        println!(
            "  {:+3}  {}%  (n={})",
            point.offset,
            fmt_value(point.mean_return),
            point.observations
        );
    }

    if let Some(regression) = &report.regression {
        println!(
            "\nRegression: {} (n={}, R2 {}, adj {})",
            regression.target,
            regression.observations,
            fmt_value(regression.r_squared).trim(),
            fmt_value(regression.adj_r_squared).trim()
        );
        for term in &regression.terms {
            println!(
                "  {:<20}{}  se {}  t {}",
                term.name,
                fmt_value(term.estimate),
                fmt_value(term.std_error),
                fmt_value(term.t_stat)
            );
        }
    }

    let patterns = &report.patterns;
    if patterns.events.is_empty() {
        return;
    }
    println!("\nPatterns");
    for event in &patterns.events {
        let volume = event
            .volume
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "  {}  pre {}  post {}  {:<14} volume {}",
            event.date,
            fmt_value(event.pre_sum),
            fmt_value(event.post_sum),
            event.pattern.to_string(),
            volume
        );
    }
    for (pattern, count) in &patterns.counts {
        println!("  {pattern}: {count}");
    }
    if let Some(dominant) = patterns.dominant() {
        println!("  dominant: {dominant}");
    }
}

fn inspect(path: &Path, preset: Preset) -> Result<()> {
    let mapping = MappingPreset::from(preset).mapping();
    let loaded = CsvLoader::new(mapping)
        .load_path(path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    let report = &loaded.report;
    println!("Source: {}", report.source_id);
    println!("Rows read: {}", report.rows_read);
    println!("Rows kept: {}", report.rows_kept);
    println!("Unparseable dates: {}", report.unparseable_dates);
    println!("Duplicate dates: {}", report.duplicate_dates);
    if !report.missing_optional.is_empty() {
        println!("Missing optional columns: {}", report.missing_optional.join(", "));
    }
    match loaded.series.span()? {
        Some(span) => println!("Span: {span}"),
        None => println!("Span: empty"),
    }
    println!("Fields: {}", loaded.series.fields().join(", "));
    Ok(())
}

fn print_features(title: &str, infos: &[FeatureInfo]) {
    println!("{title} ({} total)", infos.len());
    for info in infos {
        println!(
            "  {:<18} [{}] {} (from {})",
            info.name,
            info.kind,
            info.description,
            info.required_columns.join(", ")
        );
    }
}

fn list_features(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    print_features(
        "Derived before trimming",
        &Pipeline::derivation_features(&config).all_info(),
    );
    println!();
    print_features(
        "Rescaled after trimming",
        &Pipeline::scaling_features(&config).all_info(),
    );
    println!("\nForward targets: {}", Pipeline::forward_targets(&config).join(", "));
    Ok(())
}
