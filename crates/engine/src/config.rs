// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Configuration is read from TOML. Every table and field is optional:
//!
//! ```toml
//! [cache]
//! max_size_bytes = 5242880
//! default_ttl_ms = 3600000
//! sweep_interval_ms = 300000
//!
//! [queue]
//! max_retries = 5
//! base_delay_ms = 1000
//! max_delay_ms = 300000
//!
//! [health]
//! max_pending = 100
//! max_failed = 10
//!
//! [coordinator]
//! drain_on_enqueue = true
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::queue::RetryPolicy;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

/// Cache budget and expiry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Memory tier budget, measured as serialized entry size (default: 5 MiB).
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: usize,
    /// TTL used when callers don't pass one (default: 1 hour).
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,
    /// Period of the background expiry sweep (default: 5 minutes).
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_max_size_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_ttl_ms() -> u64 {
    60 * 60 * 1000
}

fn default_sweep_interval_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_size_bytes: default_max_size_bytes(),
            default_ttl_ms: default_ttl_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Retry settings for the operation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Attempts before an operation is dropped (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay in milliseconds (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds (default: 300000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl QueueConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Thresholds past which `check_health` reports the engine unhealthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    #[serde(default = "default_max_failed")]
    pub max_failed: usize,
}

fn default_max_pending() -> usize {
    100
}

fn default_max_failed() -> usize {
    10
}

impl Default for HealthConfig {
    fn default() -> Self {
        HealthConfig {
            max_pending: default_max_pending(),
            max_failed: default_max_failed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Drain immediately when an operation is enqueued while connected (default: true).
    #[serde(default = "default_drain_on_enqueue")]
    pub drain_on_enqueue: bool,
}

fn default_drain_on_enqueue() -> bool {
    true
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            drain_on_enqueue: default_drain_on_enqueue(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Rejects settings the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.queue.max_retries == 0 {
            return Err(Error::Config("queue.max_retries must be at least 1".to_string()));
        }
        if self.queue.base_delay_ms > self.queue.max_delay_ms {
            return Err(Error::Config(format!(
                "queue.base_delay_ms ({}) exceeds queue.max_delay_ms ({})",
                self.queue.base_delay_ms, self.queue.max_delay_ms
            )));
        }
        if self.cache.default_ttl_ms == 0 {
            return Err(Error::Config("cache.default_ttl_ms must be greater than zero".to_string()));
        }
        if self.cache.sweep_interval_ms == 0 {
            return Err(Error::Config(
                "cache.sweep_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
