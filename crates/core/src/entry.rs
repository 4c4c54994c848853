// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cache entries with expiry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::add_duration;

/// A cached value with its lifetime window.
///
/// Invariant: `expires_at > created_at` for entries written with a positive TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, value: T, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        CacheEntry {
            key: key.into(),
            value,
            created_at,
            expires_at: add_duration(created_at, ttl),
        }
    }

    /// Live entries may be served; `now >= expires_at` means stale.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
