//! Tunables for matching, freshness and delivery.
//!
//! Values come from environment variables; anything unset falls back to the
//! defaults below.

use chrono::TimeDelta;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Delay between delivery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// Doubles after every attempt, never exceeding `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            backoff: Backoff::Fixed(Duration::from_millis(200)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchmakingConfig {
    pub sweep_interval: Duration,
    /// Entries idle for longer than this are skipped by the matcher.
    pub staleness_window: Duration,
    /// Let the sweep delete stale entries instead of only skipping them.
    pub evict_stale: bool,
    pub delivery: RetryPolicy,
    pub max_message_length: usize,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        MatchmakingConfig {
            sweep_interval: Duration::from_secs(2),
            staleness_window: Duration::from_secs(5 * 60),
            evict_stale: false,
            delivery: RetryPolicy::default(),
            max_message_length: 2000,
        }
    }
}

impl MatchmakingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any key/value source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = MatchmakingConfig::default();
        let default_retry = RetryPolicy::default();

        let sweep_interval_ms = parse_var(&lookup, "SWEEP_INTERVAL_MS", 2000u64)?;
        let staleness_secs = parse_var(&lookup, "STALENESS_WINDOW_SECS", 300u64)?;
        let evict_stale = parse_var(&lookup, "EVICT_STALE", defaults.evict_stale)?;
        let max_attempts = parse_var(&lookup, "DELIVERY_MAX_ATTEMPTS", default_retry.max_attempts)?;
        let backoff_ms = parse_var(&lookup, "DELIVERY_BACKOFF_MS", 200u64)?;
        let max_message_length =
            parse_var(&lookup, "MAX_MESSAGE_LENGTH", defaults.max_message_length)?;

        if sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "SWEEP_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let base = Duration::from_millis(backoff_ms);
        let backoff = match lookup("DELIVERY_BACKOFF").as_deref() {
            None | Some("fixed") => Backoff::Fixed(base),
            Some("exponential") => Backoff::Exponential {
                initial: base,
                max: base.saturating_mul(16),
            },
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "DELIVERY_BACKOFF".to_string(),
                    format!("'{}' is not one of fixed, exponential", other),
                ))
            }
        };

        Ok(MatchmakingConfig {
            sweep_interval: Duration::from_millis(sweep_interval_ms),
            staleness_window: Duration::from_secs(staleness_secs),
            evict_stale,
            delivery: RetryPolicy {
                max_attempts,
                backoff,
            },
            max_message_length,
        })
    }

    pub fn staleness_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.staleness_window).unwrap_or(TimeDelta::MAX)
    }
}

/// Reads `name` through `lookup` and parses it, falling back to `default` when unset.
pub fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}
