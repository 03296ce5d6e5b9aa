//! Runtime configuration from environment variables
//!
//! `.env` is loaded by the binary before `RuntimeConfig::from_env` runs.

use crate::pipeline::IncompleteRecordPolicy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkBackend {
    Http { url: String },
    Sqlite { db_path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Loop,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub feed_url: String,
    pub sink: SinkBackend,
    pub mapping_path: PathBuf,
    pub update_interval: Duration,
    pub run_ttl: Duration,
    pub shutdown_grace: Duration,
    pub http_timeout: Duration,
    pub policy: IncompleteRecordPolicy,
    pub run_mode: RunMode,
    pub rust_log: String,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let feed_url = required_url(&lookup, "METER_FEED_URL")?;

        let sink = match lookup("SINK_BACKEND")
            .unwrap_or_else(|| "http".to_string())
            .to_lowercase()
            .as_str()
        {
            "http" => SinkBackend::Http {
                url: required_url(&lookup, "METER_SINK_URL")?,
            },
            "sqlite" => SinkBackend::Sqlite {
                db_path: PathBuf::from(
                    lookup("SINK_DB_PATH").unwrap_or_else(|| "data/meterflow.db".to_string()),
                ),
            },
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "SINK_BACKEND must be 'http' or 'sqlite', got '{}'",
                    other
                )))
            }
        };

        let mapping_path =
            PathBuf::from(lookup("METER_MAPPING_PATH").unwrap_or_else(|| "config.dat".to_string()));

        let update_interval = Duration::from_secs(positive(&lookup, "UPDATE_INTERVAL_MINUTES", 30u64)? * 60);
        let run_ttl = Duration::from_secs(positive(&lookup, "RUN_TTL_SECS", 600u64)?);
        let shutdown_grace = Duration::from_secs(parse_or(&lookup, "SHUTDOWN_GRACE_SECS", 30u64)?);
        let http_timeout = Duration::from_secs(positive(&lookup, "HTTP_TIMEOUT_SECS", 30u64)?);

        let policy = match lookup("INCOMPLETE_RECORD_POLICY") {
            Some(raw) => raw
                .parse::<IncompleteRecordPolicy>()
                .map_err(|e| ConfigError::InvalidValue(format!("INCOMPLETE_RECORD_POLICY: {}", e)))?,
            None => IncompleteRecordPolicy::Skip,
        };

        let run_mode = match lookup("RUN_MODE")
            .unwrap_or_else(|| "once".to_string())
            .to_lowercase()
            .as_str()
        {
            "once" => RunMode::Once,
            "loop" => RunMode::Loop,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "RUN_MODE must be 'once' or 'loop', got '{}'",
                    other
                )))
            }
        };

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            feed_url,
            sink,
            mapping_path,
            update_interval,
            run_ttl,
            shutdown_grace,
            http_timeout,
            policy,
            run_mode,
            rust_log,
        })
    }
}

fn required_url<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let url = lookup(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))?;

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::InvalidValue(format!(
            "{} must start with http:// or https://",
            key
        )));
    }

    Ok(url)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(format!("{} must be a number, got '{}'", key, raw))),
        None => Ok(default),
    }
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
{
    let value = parse_or(lookup, key, default)?;
    if value <= T::default() {
        return Err(ConfigError::InvalidValue(format!("{} must be greater than zero", key)));
    }
    Ok(value)
}
