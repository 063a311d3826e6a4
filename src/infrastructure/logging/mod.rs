//! Logger bring-up: a `tracing_subscriber::registry` layered with an
//! `EnvFilter`-gated `fmt` layer, json or pretty per config, optionally
//! duplicated to a rotating file via `tracing-appender`.

use std::io;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::infrastructure::config::model::LoggingConfig;

/// Holds the `tracing-appender` worker guard; must be kept alive for the
/// process lifetime or buffered file writes are lost on drop.
pub struct LoggerGuard {
    _guard: Option<WorkerGuard>,
}

pub fn init(config: &LoggingConfig) -> Result<LoggerGuard> {
    let level = parse_log_level(&config.level)?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let guard = if let Some(log_dir) = &config.log_dir {
        let file_appender = rolling::daily(log_dir, "daykeeper.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        let stdout_layer = stdout_layer(config);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stdout_layer)
            .init();
        Some(guard)
    } else {
        let stdout_layer = stdout_layer(config);
        tracing_subscriber::registry().with(env_filter).with(stdout_layer).init();
        None
    };

    tracing::info!(level = %config.level, format = %config.format, file_output = config.log_dir.is_some(), "logger initialized");
    Ok(LoggerGuard { _guard: guard })
}

fn stdout_layer<S>(config: &LoggingConfig) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if config.format == "json" {
        Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stdout)
                .with_target(true)
                .with_line_number(true),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(io::stdout)
                .with_target(true)
                .with_line_number(true),
        )
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(anyhow::anyhow!("invalid log level: {other}")).context("parsing logging.level"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("WARN"), Ok(Level::WARN)));
        assert!(parse_log_level("noisy").is_err());
    }
}
