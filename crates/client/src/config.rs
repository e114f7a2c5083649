//! Client configuration from environment variables.
//!
//! Unusable values fail fast with [`ConfigError`]. A poll interval outside
//! the supported range is clamped with a warning instead.

use std::time::Duration;

use reqwest::Url;
use studio_core::polling::{clamp_poll_interval, DEFAULT_POLL_INTERVAL};

use crate::poller::PollPolicy;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend running locally.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend root URL (default: `http://localhost:5000`).
    pub api_url: Url,
    /// Interval between status polls (default: 2000 ms, clamped to 1-5 s).
    pub poll_interval: Duration,
    /// Stop polling after this many failed ticks in a row. `None` polls
    /// until a terminal status or cancellation.
    pub max_consecutive_poll_failures: Option<u32>,
    /// Per-request HTTP timeout (default: 30 s).
    pub request_timeout: Duration,
}

/// A configuration variable was present but unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got '{value}'")]
    InvalidValue {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_poll_failures: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `STUDIO_API_URL`                | `http://localhost:5000` |
    /// | `POLL_INTERVAL_MS`              | `2000`                  |
    /// | `MAX_CONSECUTIVE_POLL_FAILURES` | unset (`0` = unlimited) |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("STUDIO_API_URL") {
            config.api_url = Url::parse(value.trim()).map_err(|_| ConfigError::InvalidValue {
                key: "STUDIO_API_URL",
                expected: "an absolute URL",
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup("POLL_INTERVAL_MS") {
            let ms: u64 = parse_number("POLL_INTERVAL_MS", &value)?;
            let requested = Duration::from_millis(ms);
            config.poll_interval = clamp_poll_interval(requested);
            if config.poll_interval != requested {
                tracing::warn!(
                    requested_ms = ms,
                    effective_ms = config.poll_interval.as_millis() as u64,
                    "POLL_INTERVAL_MS out of range, clamped",
                );
            }
        }

        if let Some(value) = lookup("MAX_CONSECUTIVE_POLL_FAILURES") {
            let max: u32 = parse_number("MAX_CONSECUTIVE_POLL_FAILURES", &value)?;
            config.max_consecutive_poll_failures = (max > 0).then_some(max);
        }

        if let Some(value) = lookup("REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_number("REQUEST_TIMEOUT_SECS", &value)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "REQUEST_TIMEOUT_SECS",
                    expected: "a positive number of seconds",
                    value,
                });
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Poll cadence and cutoff derived from this configuration.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_interval)
            .with_max_consecutive_failures(self.max_consecutive_poll_failures)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        expected: "a non-negative integer",
        value: value.to_string(),
    })
}
