// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors reported by the `offsync` CLI.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Engine(#[from] offsync::Error),

    #[error(transparent)]
    Core(#[from] offsync_core::Error),

    #[error("storage error: {0}")]
    Store(#[from] offsync::StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid payload: {0}\n  hint: payloads must be valid JSON, e.g. '{{\"id\": 1}}'")]
    InvalidPayload(String),

    #[error("no remote configured\n  hint: set [remote] url in config.toml or pass --offline")]
    NoRemote,

    #[error("not cached: {0}")]
    NotCached(String),

    #[error("sync did not finish within {0}ms")]
    Timeout(u64),

    #[error("unhealthy: {0} issue(s) found")]
    Unhealthy(usize),

    #[error("could not determine a state directory\n  hint: pass --state-dir or set OFFSYNC_STATE_DIR")]
    NoStateDir,
}

/// A specialized Result type for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
