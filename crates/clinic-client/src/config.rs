//! Client configuration loading
//!
//! TOML-backed settings for the pipeline: API base URL, per-attempt
//! timeout, and default retry behavior. Every field except `base_url`
//! has a sensible default, so a minimal config is just the URL.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

/// Root client configuration.
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// API origin, e.g. `https://api.clinic.example`
    pub base_url: String,
    /// Per-attempt request timeout, refresh included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Default retry behavior for idempotent reads.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Build the runtime policy from the configured values.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            predicate: None,
        }
    }
}

impl ClientConfig {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> common::Result<Self> {
        let config: ClientConfig = toml::from_str(contents)?;

        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.base_url
            )));
        }
        if config.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if config.retry.base_delay_ms > config.retry.max_delay_ms {
            return Err(common::Error::Config(format!(
                "retry.base_delay_ms ({}) must not exceed retry.max_delay_ms ({})",
                config.retry.base_delay_ms, config.retry.max_delay_ms
            )));
        }

        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
