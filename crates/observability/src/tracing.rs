//! Tracing/logging initialization.
//!
//! Filtering follows `RUST_LOG` (default `info`); the output format is chosen
//! by [`LogConfig`]. Logs go to stderr so stdout stays free for command output.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_ENV: &str = "TENANTGATE_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable lines for local use.
    Text,
}

impl core::str::FromStr for LogFormat {
    type Err = LogConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            _ => Err(LogConfigError::UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogConfigError {
    #[error("unknown log format '{0}' (expected 'json' or 'text')")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
}

impl LogConfig {
    /// Read `TENANTGATE_LOG_FORMAT`; unset means JSON.
    pub fn from_env() -> Result<Self, LogConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LogConfigError> {
        let format = match lookup(LOG_FORMAT_ENV) {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => LogFormat::default(),
        };
        Ok(Self { format })
    }
}

/// Initialize tracing/logging for the process with JSON output.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(&LogConfig::default());
}

pub fn init_with(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_json() {
        let config = LogConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn parses_format_case_insensitively() {
        let config = LogConfig::from_lookup(|_| Some(" Text ".to_string())).unwrap();
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn rejects_unknown_format() {
        let err = LogConfig::from_lookup(|_| Some("xml".to_string())).unwrap_err();
        assert_eq!(err, LogConfigError::UnknownFormat("xml".to_string()));
    }

    #[test]
    fn repeated_init_is_a_noop() {
        init();
        init_with(&LogConfig { format: LogFormat::Text });
    }
}
