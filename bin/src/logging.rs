//! tracing subscriber setup.
//!
//! Logs go to stderr; stdout carries the report.

use clap::ValueEnum;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum LogFormat {
    /// Multi-line, human oriented
    Pretty,
    /// One JSON object per event
    Json,
    /// Single line per event
    #[default]
    Compact,
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub(crate) struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or `crowd_pulse=debug`
    pub(crate) level: String,
    pub(crate) format: LogFormat,
    /// Emit span open/close events
    pub(crate) with_span_events: bool,
}

impl LogConfig {
    pub(crate) fn new(level: impl Into<String>, format: LogFormat) -> Self {
        Self {
            level: level.into(),
            format,
            with_span_events: false,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `config.level`.
pub(crate) fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events),
            )
            .try_init()?,
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_span_events(span_events),
            )
            .try_init()?,
    }

    tracing::debug!(format = ?config.format, level = %config.level, "logging initialized");
    Ok(())
}
