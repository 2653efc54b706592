//! # Structured Logging
//!
//! One `tracing` subscriber for the whole process, writing to stderr so the
//! `status` subcommand can keep stdout for its JSON. `RUST_LOG` replaces the
//! default directives when it parses; otherwise the defaults apply and the
//! rejected value is reported once logging is up.

use clap::ValueEnum;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

/// Directives used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVES: &str = "blockwindow_node=info,blockwindow_core=info,tower_http=info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable output with source locations.
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Builds the filter from a `RUST_LOG` value. Returns the rejected value
/// alongside the default filter when it does not parse.
fn filter_from(rust_log: Option<&str>) -> (EnvFilter, Option<String>) {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        None => (EnvFilter::new(DEFAULT_DIRECTIVES), None),
        Some(raw) => match EnvFilter::try_new(raw) {
            Ok(filter) => (filter, None),
            Err(_) => (EnvFilter::new(DEFAULT_DIRECTIVES), Some(raw.to_string())),
        },
    }
}

/// Installs the global subscriber. Fails if one is already set.
pub fn init_logging(format: LogFormat) -> Result<(), TryInitError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (filter, rejected) = filter_from(rust_log.as_deref());

    let (pretty, json) = match format {
        LogFormat::Pretty => (
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .try_init()?;

    if let Some(raw) = rejected {
        tracing::warn!(rust_log = %raw, default = DEFAULT_DIRECTIVES, "ignoring invalid RUST_LOG");
    }
    tracing::debug!(?format, "logging initialized");
    Ok(())
}
