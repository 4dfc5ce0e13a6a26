//! Sync engine configuration.

use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;

use crate::job::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::rate_limit::DeliveryRateLimiter;

pub const ENV_MAX_ATTEMPTS: &str = "FACTURO_MAX_ATTEMPTS";
pub const ENV_BACKOFF_BASE_MS: &str = "FACTURO_BACKOFF_BASE_MS";
pub const ENV_FRESHNESS_HOURS: &str = "FACTURO_FRESHNESS_HOURS";
pub const ENV_SUBMISSIONS_PER_MINUTE: &str = "FACTURO_SUBMISSIONS_PER_MINUTE";
pub const ENV_POLL_INTERVAL_MS: &str = "FACTURO_POLL_INTERVAL_MS";
pub const ENV_WORKER_NAME: &str = "FACTURO_WORKER_NAME";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key}: invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Attempt budget for new jobs
    pub max_attempts: u32,
    /// Delay before the first retry
    pub backoff_base: Duration,
    /// Authority acceptance window after emission
    pub freshness_window: TimeDelta,
    /// Soft cap on deliveries per minute
    pub submissions_per_minute: u32,
    /// How often the worker polls an empty queue
    pub poll_interval: Duration,
    /// Name for logging
    pub worker_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(1000),
            freshness_window: TimeDelta::hours(72),
            submissions_per_minute: 10,
            poll_interval: Duration::from_millis(500),
            worker_name: "facturo-sync".to_string(),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `FACTURO_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SyncConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = positive::<u32, _>(&lookup, ENV_MAX_ATTEMPTS)? {
            config.max_attempts = v;
        }
        if let Some(v) = positive::<u64, _>(&lookup, ENV_BACKOFF_BASE_MS)? {
            config.backoff_base = Duration::from_millis(v);
        }
        if let Some(v) = positive::<i64, _>(&lookup, ENV_FRESHNESS_HOURS)? {
            config.freshness_window =
                TimeDelta::try_hours(v).ok_or_else(|| ConfigError::Invalid {
                    key: ENV_FRESHNESS_HOURS,
                    value: v.to_string(),
                    reason: "out of range".to_string(),
                })?;
        }
        if let Some(v) = positive::<u32, _>(&lookup, ENV_SUBMISSIONS_PER_MINUTE)? {
            config.submissions_per_minute = v;
        }
        if let Some(v) = positive::<u64, _>(&lookup, ENV_POLL_INTERVAL_MS)? {
            config.poll_interval = Duration::from_millis(v);
        }
        if let Some(name) = lookup(ENV_WORKER_NAME) {
            let name = name.trim();
            if !name.is_empty() {
                config.worker_name = name.to_string();
            }
        }

        Ok(config)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_freshness_window(mut self, window: TimeDelta) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn with_submissions_per_minute(mut self, max: u32) -> Self {
        self.submissions_per_minute = max.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.backoff_base,
            freshness_window: self.freshness_window,
        }
    }

    pub fn rate_limiter(&self) -> DeliveryRateLimiter {
        DeliveryRateLimiter::per_minute(self.submissions_per_minute)
    }
}

fn positive<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let invalid = |reason: String| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason,
    };
    let value = raw.trim().parse::<T>().map_err(|e| invalid(e.to_string()))?;
    if value <= T::default() {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(Some(value))
}
