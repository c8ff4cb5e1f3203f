//! Shared configuration sections for the cache engine.
//!
//! These are deserialized from the client's TOML file and converted into
//! runtime policies by `ward-cache`. Every value is required.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Freshness and eviction windows for cached queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// How long a successful fetch is served without revalidation.
    pub stale_time_ms: u64,
    /// How long an unobserved entry survives before it may be evicted.
    pub idle_eviction_ms: u64,
}

impl CacheSettings {
    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    pub fn idle_eviction(&self) -> Duration {
        Duration::from_millis(self.idle_eviction_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stale_time_ms == 0 {
            return Err(invalid("cache.stale_time_ms", self.stale_time_ms, "must be > 0"));
        }
        if self.idle_eviction_ms == 0 {
            return Err(invalid(
                "cache.idle_eviction_ms",
                self.idle_eviction_ms,
                "must be > 0",
            ));
        }
        Ok(())
    }
}

/// Retry configuration for transient fetch failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", self.max_attempts, "must be >= 1"));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(invalid(
                "retry.max_backoff_ms",
                self.max_backoff_ms,
                "must be >= initial_backoff_ms",
            ));
        }
        if self.multiplier < 1.0 {
            return Err(invalid("retry.multiplier", self.multiplier, "must be >= 1.0"));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 4_000,
            multiplier: 2.0,
        }
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
