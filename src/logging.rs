//! Tracing subscriber setup for the binary.
//!
//! `RUST_LOG`, when set, overrides the configured level. Output goes to stderr
//! so stdout stays clean for JSON results.

use std::str::FromStr;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::domain::error::MomentumError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}', expected pretty or json")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// `[logging] level` and `format`. Absent keys take the defaults; values
    /// that do not parse are `ConfigInvalid`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, MomentumError> {
        let defaults = LoggingConfig::default();
        let level = match config.get_string("logging", "level") {
            Some(raw) if !raw.trim().is_empty() => parse_level(&raw)?,
            _ => defaults.level,
        };
        let format = match config.get_string("logging", "format") {
            Some(raw) if !raw.trim().is_empty() => raw
                .parse::<LogFormat>()
                .map_err(|e| MomentumError::config_invalid("logging", "format", e))?,
            _ => defaults.format,
        };
        Ok(LoggingConfig { level, format })
    }

    /// Replace the level, e.g. from `--log-level`.
    pub fn with_level(self, raw: &str) -> Result<Self, MomentumError> {
        Ok(LoggingConfig {
            level: parse_level(raw)?,
            ..self
        })
    }
}

/// A bare level (`trace` .. `error`, `off`) or a filter directive list such as
/// `momentum_wf=debug,warn`.
fn parse_level(raw: &str) -> Result<String, MomentumError> {
    let level = raw.trim();
    let invalid = |reason: String| MomentumError::config_invalid("logging", "level", reason);
    if level.contains('=') || level.contains(',') {
        EnvFilter::try_new(level).map_err(|e| invalid(format!("bad directive '{level}': {e}")))?;
    } else {
        LevelFilter::from_str(level).map_err(|_| {
            invalid(format!(
                "unknown level '{level}', expected trace, debug, info, warn, error or off"
            ))
        })?;
    }
    Ok(level.to_string())
}

fn build_filter(level: &str) -> Result<EnvFilter, MomentumError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| MomentumError::config_invalid("logging", "level", e.to_string()))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) -> Result<(), MomentumError> {
    let subscriber = tracing_subscriber::registry().with(build_filter(&config.level)?);

    match config.format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            let _ = subscriber.with(layer).try_init();
        }
        LogFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false);
            let _ = subscriber.with(layer).try_init();
        }
    }

    tracing::debug!(level = %config.level, format = ?config.format, "logging initialized");
    Ok(())
}
