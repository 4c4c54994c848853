// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[test]
fn empty_config_uses_defaults() {
    let config = EngineConfig::from_toml("").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.cache.max_size_bytes, 5 * 1024 * 1024);
    assert_eq!(config.queue.max_retries, 5);
    assert_eq!(config.queue.base_delay_ms, 1000);
    assert_eq!(config.queue.max_delay_ms, 300_000);
    assert!(config.coordinator.drain_on_enqueue);
}

#[test]
fn partial_tables_keep_other_defaults() {
    let config = EngineConfig::from_toml(
        r#"
[queue]
max_retries = 3

[cache]
default_ttl_ms = 500
"#,
    )
    .unwrap();
    assert_eq!(config.queue.max_retries, 3);
    assert_eq!(config.queue.base_delay_ms, 1000);
    assert_eq!(config.cache.default_ttl(), Duration::from_millis(500));
    assert_eq!(config.health.max_pending, 100);
}

#[test]
fn policy_reflects_queue_settings() {
    let config = QueueConfig { max_retries: 2, base_delay_ms: 10, max_delay_ms: 40 };
    let policy = config.policy();
    assert_eq!(policy.max_retries, 2);
    assert_eq!(policy.base_delay, Duration::from_millis(10));
    assert_eq!(policy.max_delay, Duration::from_millis(40));
}

#[parameterized(
    zero_retries = { "[queue]\nmax_retries = 0" },
    base_over_max = { "[queue]\nbase_delay_ms = 10\nmax_delay_ms = 5" },
    zero_ttl = { "[cache]\ndefault_ttl_ms = 0" },
    zero_sweep = { "[cache]\nsweep_interval_ms = 0" },
    bad_type = { "[queue]\nmax_retries = \"many\"" },
)]
fn invalid_configs_are_rejected(content: &str) {
    let err = EngineConfig::from_toml(content).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn load_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("offsync.toml");
    std::fs::write(&path, "[health]\nmax_failed = 2\n").unwrap();
    let config = EngineConfig::load(&path).unwrap();
    assert_eq!(config.health.max_failed, 2);
}

#[test]
fn load_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = EngineConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
