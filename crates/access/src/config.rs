//! Guard configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SIGN_IN_PATH_ENV: &str = "TENANTGATE_SIGN_IN_PATH";
pub const UNAUTHORIZED_PATH_ENV: &str = "TENANTGATE_UNAUTHORIZED_PATH";

const DEFAULT_SIGN_IN_PATH: &str = "/login";
const DEFAULT_UNAUTHORIZED_PATH: &str = "/unauthorized";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be an absolute path starting with '/', got '{value}'")]
    InvalidPath { key: &'static str, value: String },
}

/// Where route guards send principals they turn away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub sign_in_path: String,
    pub unauthorized_path: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
            unauthorized_path: DEFAULT_UNAUTHORIZED_PATH.to_string(),
        }
    }
}

impl AccessConfig {
    /// Load from `TENANTGATE_*` environment variables, defaulting unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            sign_in_path: read_or_default(&lookup, SIGN_IN_PATH_ENV, defaults.sign_in_path),
            unauthorized_path: read_or_default(&lookup, UNAUTHORIZED_PATH_ENV, defaults.unauthorized_path),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_path(SIGN_IN_PATH_ENV, &self.sign_in_path)?;
        check_path(UNAUTHORIZED_PATH_ENV, &self.unauthorized_path)?;
        Ok(())
    }
}

fn read_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: String) -> String {
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => {
            tracing::debug!(key, default = %default, "not set; using default");
            default
        }
    }
}

fn check_path(key: &'static str, value: &str) -> Result<(), ConfigError> {
    // Browsers treat `/\host` like `//host`.
    let second = value.chars().nth(1);
    if value.starts_with('/') && !matches!(second, Some('/' | '\\')) {
        Ok(())
    } else {
        Err(ConfigError::InvalidPath {
            key,
            value: value.to_string(),
        })
    }
}
