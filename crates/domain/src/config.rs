//! Aggregate store configuration loaded from environment variables.

use thiserror::Error;

/// Invalid configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be an integer, got '{value}'")]
    NotAnInteger { key: &'static str, value: String },

    #[error("{key} must be {requirement}, got {value}")]
    OutOfRange {
        key: &'static str,
        requirement: &'static str,
        value: i64,
    },

    #[error("{key} has unsupported value '{value}'")]
    Unsupported { key: &'static str, value: String },
}

/// Aggregate store configuration.
///
/// Reads from environment variables:
/// - `SNAPSHOT_FREQUENCY`: events between snapshots (default: `0`, disabled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreConfig {
    pub snapshot_frequency: u64,
}

impl StoreConfig {
    pub const SNAPSHOT_FREQUENCY: &'static str = "SNAPSHOT_FREQUENCY";

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let snapshot_frequency = match lookup(Self::SNAPSHOT_FREQUENCY) {
            Some(raw) => parse_non_negative(Self::SNAPSHOT_FREQUENCY, &raw)?,
            None => 0,
        };

        Ok(Self { snapshot_frequency })
    }
}

/// Parses a signed integer and rejects negatives.
pub fn parse_non_negative(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let value = parse_i64(key, raw)?;
    u64::try_from(value).map_err(|_| ConfigError::OutOfRange {
        key,
        requirement: ">= 0",
        value,
    })
}

pub fn parse_i64(key: &'static str, raw: &str) -> Result<i64, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::NotAnInteger {
            key,
            value: raw.to_string(),
        })
}
