//! Runtime configuration.
//!
//! Defaults are compile-time constants; [`Config::from_env`] overrides them
//! from `PAYBATCH_*` environment variables (a `.env` file is loaded first by
//! the binary). CLI flags override both.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{RecordKind, WriteMode};
use crate::upload::RetryPolicy;

/// Records per bulk-create request for employees.
pub const DEFAULT_EMPLOYEE_CHUNK_SIZE: usize = 50;

/// Records per request for updates and for the NIC/Tax and timesheet kinds.
pub const DEFAULT_UPDATE_CHUNK_SIZE: usize = 10;

/// Rows per parser batch.
pub const DEFAULT_PARSE_BATCH_SIZE: usize = 500;

/// Attempts per chunk, the first one included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubled on each further retry.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// HTTP server port.
pub const DEFAULT_PORT: u16 = 3000;

/// How long a finished upload session stays available for polling.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Maximum accepted upload body.
///
/// 50 MB limit.
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

pub const ENV_API_URL: &str = "PAYBATCH_API_URL";
pub const ENV_API_TOKEN: &str = "PAYBATCH_API_TOKEN";
pub const ENV_EMPLOYEE_CHUNK_SIZE: &str = "PAYBATCH_EMPLOYEE_CHUNK_SIZE";
pub const ENV_UPDATE_CHUNK_SIZE: &str = "PAYBATCH_UPDATE_CHUNK_SIZE";
pub const ENV_PARSE_BATCH_SIZE: &str = "PAYBATCH_PARSE_BATCH_SIZE";
pub const ENV_MAX_ATTEMPTS: &str = "PAYBATCH_MAX_ATTEMPTS";
pub const ENV_RETRY_DELAY_MS: &str = "PAYBATCH_RETRY_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the remote API; only networked commands need it.
    pub api_url: Option<String>,
    /// Bearer token forwarded as-is.
    pub api_token: Option<String>,
    pub employee_chunk_size: usize,
    pub update_chunk_size: usize,
    pub parse_batch_size: usize,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            api_token: None,
            employee_chunk_size: DEFAULT_EMPLOYEE_CHUNK_SIZE,
            update_chunk_size: DEFAULT_UPDATE_CHUNK_SIZE,
            parse_batch_size: DEFAULT_PARSE_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset and empty values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            api_url: get(ENV_API_URL).map(|u| u.trim_end_matches('/').to_string()),
            api_token: get(ENV_API_TOKEN),
            employee_chunk_size: positive(
                ENV_EMPLOYEE_CHUNK_SIZE,
                get(ENV_EMPLOYEE_CHUNK_SIZE),
                defaults.employee_chunk_size,
            )?,
            update_chunk_size: positive(
                ENV_UPDATE_CHUNK_SIZE,
                get(ENV_UPDATE_CHUNK_SIZE),
                defaults.update_chunk_size,
            )?,
            parse_batch_size: positive(
                ENV_PARSE_BATCH_SIZE,
                get(ENV_PARSE_BATCH_SIZE),
                defaults.parse_batch_size,
            )?,
            max_attempts: positive(ENV_MAX_ATTEMPTS, get(ENV_MAX_ATTEMPTS), defaults.max_attempts)?,
            retry_delay_ms: parse(ENV_RETRY_DELAY_MS, get(ENV_RETRY_DELAY_MS), defaults.retry_delay_ms)?,
        })
    }

    /// The API base URL, or an error naming the variable to set.
    pub fn require_api_url(&self) -> Result<&str, ConfigError> {
        self.api_url.as_deref().ok_or(ConfigError::Missing(ENV_API_URL))
    }

    /// Employees are created 50 at a time; everything else goes 10 at a time.
    pub fn chunk_size_for(&self, kind: RecordKind, mode: WriteMode) -> usize {
        match (kind, mode) {
            (RecordKind::Employee, WriteMode::Create) => self.employee_chunk_size,
            _ => self.update_chunk_size,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }
}

fn parse<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
            value,
        }),
    }
}

fn positive<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let value = parse(key, raw, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.chunk_size_for(RecordKind::Employee, WriteMode::Create), 50);
        assert_eq!(cfg.chunk_size_for(RecordKind::Employee, WriteMode::Update), 10);
        assert_eq!(cfg.chunk_size_for(RecordKind::Timesheet, WriteMode::Create), 10);
        assert_eq!(cfg.require_api_url(), Err(ConfigError::Missing("PAYBATCH_API_URL")));
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("PAYBATCH_API_URL", "https://api.example.com/v1/"),
            ("PAYBATCH_EMPLOYEE_CHUNK_SIZE", "25"),
            ("PAYBATCH_RETRY_DELAY_MS", "0"),
            ("PAYBATCH_API_TOKEN", ""),
        ])
        .unwrap();

        assert_eq!(cfg.require_api_url(), Ok("https://api.example.com/v1"));
        assert_eq!(cfg.employee_chunk_size, 25);
        assert_eq!(cfg.retry_delay_ms, 0);
        assert_eq!(cfg.api_token, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = config(&[("PAYBATCH_UPDATE_CHUNK_SIZE", "ten")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "PAYBATCH_UPDATE_CHUNK_SIZE", .. }
        ));

        let err = config(&[("PAYBATCH_EMPLOYEE_CHUNK_SIZE", "0")]).unwrap_err();
        assert!(err.to_string().contains("must be at least 1"));
    }
}
