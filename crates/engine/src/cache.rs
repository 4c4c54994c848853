// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Two-tier cache with per-entry TTL.
//!
//! The memory tier answers reads without touching storage; the persistent
//! tier (keys `cache:{key}`) survives restarts and backs memory misses.
//! Writes go to memory first and are then persisted before `cache` returns.
//! A failed persist leaves the entry memory-only and is counted in
//! [`CacheStats::persist_failures`].
//!
//! The memory tier is bounded by the serialized size of its entries. An insert
//! that would exceed the budget first drops expired entries from both tiers,
//! then evicts the oldest live entries (by creation time) from memory only;
//! evicted entries stay readable from the persistent tier until they expire.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use offsync_core::{CacheEntry, ClockSource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::store::{PersistentStore, CACHE_PREFIX};

fn store_key(key: &str) -> String {
    format!("{}{}", CACHE_PREFIX, key)
}

/// Counters reported by [`CacheEngine::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub memory_bytes: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    /// Live entries pushed out of memory by size pressure.
    pub evictions: u64,
    pub expired_removed: u64,
    pub persist_failures: u64,
}

struct MemoryEntry {
    value: serde_json::Value,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    size: usize,
}

impl MemoryEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct MemoryTier {
    entries: HashMap<String, MemoryEntry>,
    bytes: usize,
}

impl MemoryTier {
    fn remove(&mut self, key: &str) -> Option<MemoryEntry> {
        let entry = self.entries.remove(key)?;
        self.bytes = self.bytes.saturating_sub(entry.size);
        Some(entry)
    }

    fn insert(&mut self, key: String, entry: MemoryEntry) {
        self.bytes += entry.size;
        if let Some(previous) = self.entries.insert(key, entry) {
            self.bytes = self.bytes.saturating_sub(previous.size);
        }
    }

    fn remove_expired(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired
    }

    fn oldest(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by(|(ka, a), (kb, b)| a.created_at.cmp(&b.created_at).then_with(|| ka.cmp(kb)))
            .map(|(key, _)| key.clone())
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_removed: AtomicU64,
    persist_failures: AtomicU64,
}

fn bump(counter: &AtomicU64, by: usize) {
    counter.fetch_add(by as u64, Ordering::Relaxed);
}

/// Memory + persistent cache of JSON-serializable values.
pub struct CacheEngine {
    store: Arc<dyn PersistentStore>,
    clock: Arc<dyn ClockSource>,
    max_bytes: usize,
    default_ttl: Duration,
    memory: Mutex<MemoryTier>,
    counters: Counters,
}

impl CacheEngine {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        clock: Arc<dyn ClockSource>,
        config: &CacheConfig,
    ) -> Self {
        CacheEngine {
            store,
            clock,
            max_bytes: config.max_size_bytes,
            default_ttl: config.default_ttl(),
            memory: Mutex::new(MemoryTier::default()),
            counters: Counters::default(),
        }
    }

    /// TTL applied by [`cache_default`](Self::cache_default).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stores `value` under `key` for `ttl`.
    ///
    /// The memory tier is updated before this returns, so a following `get`
    /// sees the new value. Persistence failures are logged, not returned,
    /// unless the entry is too large for memory: then nothing would hold it
    /// and [`Error::EntryNotStored`] is returned.
    pub fn cache<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(Error::InvalidTtl);
        }

        let now = self.clock.now();
        let entry = CacheEntry::new(key, serde_json::to_value(value)?, now, ttl);
        let raw = serde_json::to_string(&entry)?;
        let size = raw.len();
        let in_memory = self.admit(key, entry, size, now);

        if let Err(e) = self.store.set(&store_key(key), &raw) {
            bump(&self.counters.persist_failures, 1);
            if !in_memory {
                warn!(key, size, error = %e, "oversize cache entry not persisted");
                return Err(Error::EntryNotStored { key: key.to_string(), size, source: e });
            }
            warn!(key, error = %e, "cache entry not persisted; serving from memory only");
        }
        Ok(())
    }

    /// [`cache`](Self::cache) with the configured default TTL.
    pub fn cache_default<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.cache(key, value, self.default_ttl)
    }

    /// Returns the live value under `key`, if any.
    ///
    /// Fails only when the stored value does not deserialize as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.lookup(key) {
            Some(value) => {
                bump(&self.counters.hits, 1);
                Ok(Some(serde_json::from_value(value)?))
            }
            None => {
                bump(&self.counters.misses, 1);
                Ok(None)
            }
        }
    }

    /// Whether a live entry exists under `key`. Does not count as a hit or miss.
    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Cache-first read: on a miss, awaits `fetcher` and caches its result.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetcher: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        E: std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(cached) = self.get(key)? {
            return Ok(cached);
        }
        let fresh = fetcher().await.map_err(|e| Error::Fetch(e.to_string()))?;
        self.cache(key, &fresh, ttl)?;
        Ok(fresh)
    }

    /// Deletes `key` from both tiers. Returns whether either tier held it.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let in_memory = self.lock_memory().remove(key).is_some();
        let skey = store_key(key);
        let persisted = self.store.get(&skey)?.is_some();
        self.store.remove(&skey)?;
        Ok(in_memory || persisted)
    }

    /// Drops expired entries from both tiers.
    ///
    /// Returns the number of distinct keys removed.
    pub fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed: BTreeSet<String> = self.lock_memory().remove_expired(now).into_iter().collect();
        removed.extend(self.sweep_store(now));

        bump(&self.counters.expired_removed, removed.len());
        if !removed.is_empty() {
            debug!(removed = removed.len(), "expired cache entries removed");
        }
        removed.len()
    }

    /// Empties both tiers.
    pub fn clear(&self) -> Result<()> {
        {
            let mut memory = self.lock_memory();
            memory.entries.clear();
            memory.bytes = 0;
        }
        let keys = self.store.list_keys(CACHE_PREFIX)?;
        self.store.remove_many(&keys)?;
        debug!(removed = keys.len(), "cache cleared");
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let (memory_entries, memory_bytes) = {
            let memory = self.lock_memory();
            (memory.entries.len(), memory.bytes)
        };
        CacheStats {
            memory_entries,
            memory_bytes,
            max_bytes: self.max_bytes,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expired_removed: self.counters.expired_removed.load(Ordering::Relaxed),
            persist_failures: self.counters.persist_failures.load(Ordering::Relaxed),
        }
    }

    /// Runs [`clear_expired`](Self::clear_expired) every `interval` until
    /// `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.clear_expired();
                    }
                }
            }
            debug!("cache sweeper stopped");
        })
    }

    fn lookup(&self, key: &str) -> Option<serde_json::Value> {
        let now = self.clock.now();
        {
            let mut memory = self.lock_memory();
            match memory.entries.get(key).map(|entry| entry.is_live(now)) {
                Some(true) => return memory.entries.get(key).map(|entry| entry.value.clone()),
                Some(false) => {
                    memory.remove(key);
                    bump(&self.counters.expired_removed, 1);
                }
                None => {}
            }
        }

        let raw = match self.store.get(&store_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "cache read from store failed");
                return None;
            }
        };
        let entry: CacheEntry<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "ignoring corrupt cache entry");
                return None;
            }
        };
        // Expired persisted entries are left for the sweep
        if !entry.is_live(now) {
            return None;
        }

        let value = entry.value.clone();
        self.admit(key, entry, raw.len(), now);
        Some(value)
    }

    /// Places an entry in the memory tier, making room if needed.
    ///
    /// Returns false when the entry alone exceeds the budget and was kept out
    /// of memory.
    fn admit(
        &self,
        key: &str,
        entry: CacheEntry<serde_json::Value>,
        size: usize,
        now: DateTime<Utc>,
    ) -> bool {
        let expired_in_memory = {
            let mut memory = self.lock_memory();
            memory.remove(key);
            if size > self.max_bytes {
                debug!(key, size, max = self.max_bytes, "entry exceeds memory budget; persisted only");
                return false;
            }

            let mut expired = None;
            if memory.bytes + size > self.max_bytes {
                expired = Some(memory.remove_expired(now));
                while memory.bytes + size > self.max_bytes {
                    let Some(oldest) = memory.oldest() else {
                        break;
                    };
                    memory.remove(&oldest);
                    bump(&self.counters.evictions, 1);
                    debug!(key = %oldest, "evicted from memory tier");
                }
            }

            memory.insert(
                key.to_string(),
                MemoryEntry {
                    value: entry.value,
                    created_at: entry.created_at,
                    expires_at: entry.expires_at,
                    size,
                },
            );
            expired
        };

        if let Some(expired) = expired_in_memory {
            let mut removed: BTreeSet<String> = expired.into_iter().collect();
            removed.extend(self.sweep_store(now));
            bump(&self.counters.expired_removed, removed.len());
        }
        true
    }

    /// Removes expired (and unreadable) cache records from the store.
    fn sweep_store(&self, now: DateTime<Utc>) -> Vec<String> {
        let keys = match self.store.list_keys(CACHE_PREFIX) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "cache sweep skipped: store unavailable");
                return Vec::new();
            }
        };

        let mut stale = Vec::new();
        for skey in keys {
            let expired = match self.store.get(&skey) {
                Ok(Some(raw)) => serde_json::from_str::<CacheEntry<serde_json::Value>>(&raw)
                    .map(|entry| !entry.is_live(now))
                    .unwrap_or(true),
                Ok(None) => false,
                Err(e) => {
                    warn!(key = %skey, error = %e, "cache sweep read failed");
                    false
                }
            };
            if expired {
                stale.push(skey);
            }
        }

        if stale.is_empty() {
            return stale;
        }
        if let Err(e) = self.store.remove_many(&stale) {
            warn!(error = %e, "cache sweep failed to remove expired entries");
            return Vec::new();
        }
        stale
            .into_iter()
            .map(|skey| match skey.strip_prefix(CACHE_PREFIX) {
                Some(key) => key.to_string(),
                None => skey.clone(),
            })
            .collect()
    }

    fn lock_memory(&self) -> std::sync::MutexGuard<'_, MemoryTier> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
