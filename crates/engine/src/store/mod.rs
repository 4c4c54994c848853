// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable key/value storage.
//!
//! The engine only needs string keys and string values with prefix listing.
//! No multi-key transactional guarantee is assumed by callers.
//!
//! Key namespaces:
//! - `cache:{key}` - serialized cache entries
//! - `queue:{id}` - serialized queued operations
//! - `meta:*` - queue bookkeeping (last sync time, auth block)

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Key prefix for cache entries.
pub const CACHE_PREFIX: &str = "cache:";
/// Key prefix for queued operations.
pub const QUEUE_PREFIX: &str = "queue:";
/// Timestamp of the last completed drain.
pub const META_LAST_SYNC: &str = "meta:last_sync";
/// Present while sync is halted pending re-authentication.
pub const META_AUTH_REQUIRED: &str = "meta:auth_required";

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key/value persistence consumed by the cache and the queue.
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;

    fn remove_many(&self, keys: &[String]) -> StoreResult<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }

    /// All keys starting with `prefix`, in ascending order.
    fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
