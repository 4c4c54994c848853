// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::store::StoreError;

/// All possible errors that can occur in the offsync engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] offsync_core::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid ttl: cache entries need a ttl greater than zero")]
    InvalidTtl,

    #[error("operation not found: {0}")]
    OperationNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("cache entry '{key}' ({size} bytes) is larger than the memory tier and could not be persisted: {source}\n  hint: raise cache.max_size_bytes or check the state directory")]
    EntryNotStored {
        key: String,
        size: usize,
        source: StoreError,
    },
}

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
