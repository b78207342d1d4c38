//! Worker configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use domain::config::{ConfigError, StoreConfig, parse_non_negative};
use projections::{DEFAULT_BATCH_SIZE, DEFAULT_POLL_INTERVAL};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Projector configuration.
///
/// Reads from environment variables:
/// - `SNAPSHOT_FREQUENCY`: events between snapshots (default: `0`, disabled)
/// - `DATABASE_URL`: Postgres connection string; in-memory store when unset
/// - `SUBSCRIPTION_ID`: checkpoint key (default: `"order-views"`)
/// - `POLL_INTERVAL_MS`: idle wait between log reads (default: `500`)
/// - `BATCH_SIZE`: records per read, at least 1 (default: `256`)
/// - `METRICS_ADDR`: Prometheus listener address; no exporter when unset
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `SEED_ORDERS`: demo orders written at start-up, in-memory store only (default: `0`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub store: StoreConfig,
    pub database_url: Option<String>,
    pub subscription_id: String,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub metrics_addr: Option<SocketAddr>,
    pub log_format: LogFormat,
    pub log_level: String,
    pub seed_orders: u64,
}

impl Config {
    pub const DEFAULT_SUBSCRIPTION_ID: &'static str = "order-views";

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Unset variables take their
    /// defaults; set but invalid ones are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = StoreConfig::from_lookup(&lookup)?;

        let poll_interval = match lookup("POLL_INTERVAL_MS") {
            Some(raw) => Duration::from_millis(parse_non_negative("POLL_INTERVAL_MS", &raw)?),
            None => DEFAULT_POLL_INTERVAL,
        };

        let batch_size = match lookup("BATCH_SIZE") {
            Some(raw) => match parse_non_negative("BATCH_SIZE", &raw)? {
                0 => {
                    return Err(ConfigError::OutOfRange {
                        key: "BATCH_SIZE",
                        requirement: "> 0",
                        value: 0,
                    });
                }
                n => usize::try_from(n).map_err(|_| ConfigError::Unsupported {
                    key: "BATCH_SIZE",
                    value: raw.clone(),
                })?,
            },
            None => DEFAULT_BATCH_SIZE,
        };

        let metrics_addr = lookup("METRICS_ADDR")
            .map(|raw| {
                raw.trim()
                    .parse::<SocketAddr>()
                    .map_err(|_| ConfigError::Unsupported {
                        key: "METRICS_ADDR",
                        value: raw.clone(),
                    })
            })
            .transpose()?;

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Unsupported {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        let seed_orders = match lookup("SEED_ORDERS") {
            Some(raw) => parse_non_negative("SEED_ORDERS", &raw)?,
            None => 0,
        };

        Ok(Self {
            store,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            subscription_id: lookup("SUBSCRIPTION_ID")
                .unwrap_or_else(|| Self::DEFAULT_SUBSCRIPTION_ID.to_string()),
            poll_interval,
            batch_size,
            metrics_addr,
            log_format,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            seed_orders,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            database_url: None,
            subscription_id: Self::DEFAULT_SUBSCRIPTION_ID.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            metrics_addr: None,
            log_format: LogFormat::Text,
            log_level: "info".to_string(),
            seed_orders: 0,
        }
    }
}
