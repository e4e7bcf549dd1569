//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! Two modes:
//! - **Production** ([`init_production`]): JSON file layer (daily rotation) + console layer
//! - **CLI** ([`init_cli`]): console-only
//!
//! `RUST_LOG` wins over the configured level when set.

use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Holds the non-blocking writer guard for file logging.
///
/// The [`WorkerGuard`] must be kept alive for the duration of the process.
/// Dropping it flushes pending log entries and closes the file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Map a level name or number to a filter.
///
/// Names are case-insensitive: `critical` and `error` map to ERROR,
/// `warning`/`warn` to WARN, `notset` to TRACE. Numbers follow the
/// conventional 10/20/30/40/50 scale. Anything else is INFO.
pub fn parse_level(value: Option<&str>) -> LevelFilter {
    let Some(cleaned) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return LevelFilter::INFO;
    };
    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        return match cleaned.parse::<u64>() {
            Ok(n) if n < 10 => LevelFilter::TRACE,
            Ok(n) if n < 20 => LevelFilter::DEBUG,
            Ok(n) if n < 30 => LevelFilter::INFO,
            Ok(n) if n < 40 => LevelFilter::WARN,
            _ => LevelFilter::ERROR,
        };
    }
    match cleaned.to_ascii_lowercase().as_str() {
        "critical" | "error" => LevelFilter::ERROR,
        "warning" | "warn" => LevelFilter::WARN,
        "info" => LevelFilter::INFO,
        "debug" => LevelFilter::DEBUG,
        "notset" | "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Initialise logging for the long-running worker (production mode).
///
/// Writes JSON logs to `{logs_dir}/smsgw.log.YYYY-MM-DD` with daily
/// rotation and human-readable output to stderr.
///
/// Returns a [`LoggingGuard`] that must be kept alive for log flushing.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created or a global
/// subscriber is already installed.
pub fn init_production(logs_dir: &Path, level: LevelFilter) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        anyhow::anyhow!(
            "failed to create logs directory {}: {e}",
            logs_dir.display()
        )
    })?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "smsgw.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking);

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(json_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?;

    Ok(LoggingGuard { _guard: guard })
}

/// Initialise stderr-only logging.
///
/// Silently keeps an already installed subscriber.
pub fn init_cli(level: LevelFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .try_init();
}
