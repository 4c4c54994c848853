// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queued remote-sync operations.
//!
//! A [`QueuedOperation`] is the durable record of a local write that still has
//! to reach the remote store. It is created by `enqueue`, mutated in place on
//! each failed attempt, and deleted on success or terminal failure.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::failure::{FailureKind, SyncFailure};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Opaque unique token identifying a queued operation.
///
/// Format: `op-{hash}` where hash is the first 16 hex chars of a SHA-256 over
/// the operation kind, creation time, process id and a process-local counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        OperationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates a fresh id for an operation of `kind` created at `created_at`.
    pub fn generate(kind: OperationKind, created_at: &DateTime<Utc>) -> Self {
        let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let input = format!(
            "{}{}{}{}",
            kind,
            created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            std::process::id(),
            seq
        );
        let hash = Sha256::digest(input.as_bytes());
        OperationId(format!("op-{}", hex::encode(&hash[..8])))
    }

    /// Generates an id, appending an incrementing suffix on collision.
    pub fn generate_unique<F>(kind: OperationKind, created_at: &DateTime<Utc>, exists: F) -> Self
    where
        F: Fn(&OperationId) -> bool,
    {
        let base = Self::generate(kind, created_at);
        if !exists(&base) {
            return base;
        }

        let mut suffix = 2;
        loop {
            let id = OperationId(format!("{}-{}", base.0, suffix));
            if !exists(&id) {
                return id;
            }
            suffix += 1;
        }
    }

    /// Deterministic key the remote side can deduplicate retried executions on.
    ///
    /// Stable across process restarts since it depends only on the id.
    pub fn idempotency_key(&self) -> String {
        let hash = Sha256::digest(format!("offsync-idempotency:{}", self.0).as_bytes());
        hex::encode(&hash[..16])
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        OperationId(s.to_string())
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        OperationId(s)
    }
}

/// The application-level writes that can be queued for remote sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    SaveNote,
    DeleteNote,
    SaveBookmark,
    DeleteBookmark,
    UpdatePreferences,
    UpdateProfile,
    RecordProgress,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::SaveNote,
        OperationKind::DeleteNote,
        OperationKind::SaveBookmark,
        OperationKind::DeleteBookmark,
        OperationKind::UpdatePreferences,
        OperationKind::UpdateProfile,
        OperationKind::RecordProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::SaveNote => "save_note",
            OperationKind::DeleteNote => "delete_note",
            OperationKind::SaveBookmark => "save_bookmark",
            OperationKind::DeleteBookmark => "delete_bookmark",
            OperationKind::UpdatePreferences => "update_preferences",
            OperationKind::UpdateProfile => "update_profile",
            OperationKind::RecordProgress => "record_progress",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| Error::InvalidOperationKind(s.to_string()))
    }
}

/// The most recent classified failure recorded against an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastError {
    pub kind: FailureKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// A pending remote-sync operation as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl QueuedOperation {
    /// Creates a never-attempted operation.
    pub fn new(
        id: OperationId,
        kind: OperationKind,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        QueuedOperation {
            id,
            kind,
            payload,
            created_at,
            retry_count: 0,
            last_error: None,
            next_retry_at: None,
        }
    }

    /// Ready for an attempt: never tried, or its backoff has elapsed.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        if self.retry_count == 0 {
            return true;
        }
        self.next_retry_at.is_none_or(|at| at <= now)
    }

    /// Records a failed attempt and the time the next one may run.
    ///
    /// `next_retry_at` never moves backwards across consecutive failures.
    pub fn record_failure(
        &mut self,
        failure: &SyncFailure,
        at: DateTime<Utc>,
        next_retry_at: DateTime<Utc>,
    ) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error = Some(LastError {
            kind: failure.kind,
            message: failure.message.clone(),
            at,
        });
        self.next_retry_at = Some(match self.next_retry_at {
            Some(previous) if previous > next_retry_at => previous,
            _ => next_retry_at,
        });
    }

    /// Serializes the operation to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes an operation from JSON.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
