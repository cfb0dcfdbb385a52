//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Prepended to relative request URLs by the HTTP transport
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Prefix for root collection levels without a fetch path
    pub api_prefix: String,
    /// Retry and backoff settings
    pub retry: RetryPolicy,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 30,
            api_prefix: "/api".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RestConfig {
    /// Parse a TOML document, e.g.
    ///
    /// ```toml
    /// base_url = "https://api.example.com"
    ///
    /// [retry]
    /// max_attempts = 4
    /// base_delay_ms = 100
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts for a normal request
    pub max_attempts: u32,
    /// Attempts when the request sets `no_retry`
    pub no_retry_attempts: u32,
    /// Delay after the first failed attempt, doubled per attempt
    pub base_delay_ms: u64,
    /// Upper bound for a single delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            no_retry_attempts: 1,
            base_delay_ms: 100,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Policy without any backoff delay (tests, local fixtures)
    pub fn immediate() -> Self {
        Self {
            base_delay_ms: 0,
            max_delay_ms: 0,
            ..Default::default()
        }
    }

    pub fn attempts_for(&self, no_retry: bool) -> u32 {
        if no_retry {
            self.no_retry_attempts.max(1)
        } else {
            self.max_attempts.max(1)
        }
    }

    /// Delay to wait after the given zero-based attempt failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}
