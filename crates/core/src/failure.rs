// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Failure taxonomy for remote execution.
//!
//! Every failed execution attempt is reduced to a [`FailureKind`]; the queue's
//! retry policy is driven entirely by that kind and the retriable flag.
//! Backends report errors as status codes (`unavailable`, `permission-denied`,
//! ...) or free-form messages, and [`classify_code`] / [`classify_message`]
//! map both onto the taxonomy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Classified cause of a failed remote execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Credentials missing or rejected. Requires re-authentication.
    Auth,
    /// Connectivity problem. Retried with a short backoff.
    Network,
    /// Rate limit or quota exhaustion. Retried with the maximum backoff.
    Quota,
    /// Payload rejected permanently by the remote side.
    Data,
    /// Unrecognized failure, treated as transient.
    Unknown,
}

impl FailureKind {
    /// All kinds, in declaration order.
    pub const ALL: [FailureKind; 5] = [
        FailureKind::Auth,
        FailureKind::Network,
        FailureKind::Quota,
        FailureKind::Data,
        FailureKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Auth => "auth",
            FailureKind::Network => "network",
            FailureKind::Quota => "quota",
            FailureKind::Data => "data",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Whether a later attempt may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, FailureKind::Network | FailureKind::Quota | FailureKind::Unknown)
    }

    /// Short text suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::Auth => "Please sign in again to sync your changes.",
            FailureKind::Network => "You're offline. Changes will sync when you reconnect.",
            FailureKind::Quota => "Sync is temporarily limited. We'll try again shortly.",
            FailureKind::Data => "A change could not be saved and was discarded.",
            FailureKind::Unknown => "Something went wrong while syncing. We'll retry.",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auth" => Ok(FailureKind::Auth),
            "network" => Ok(FailureKind::Network),
            "quota" => Ok(FailureKind::Quota),
            "data" => Ok(FailureKind::Data),
            "unknown" => Ok(FailureKind::Unknown),
            _ => Err(Error::InvalidFailureKind(s.to_string())),
        }
    }
}

/// A classified execution failure as reported by a remote executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct SyncFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Executor's own verdict. Can only narrow the kind's retriability.
    pub retriable: bool,
}

impl SyncFailure {
    /// Creates a failure whose retriability follows its kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        SyncFailure {
            kind,
            message: message.into(),
            retriable: kind.is_retriable(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Auth, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Quota, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Data, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }

    /// Builds a failure from a backend status code and message.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(classify_code(code, &message), message)
    }

    /// Marks this failure as never worth retrying.
    pub fn permanent(mut self) -> Self {
        self.retriable = false;
        self
    }

    /// Effective retriability: the kind must allow it and the executor must not have vetoed it.
    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable() && self.retriable
    }
}

/// Maps a backend status code onto the failure taxonomy.
///
/// Codes are matched case-insensitively, with an optional `firestore/` or
/// `auth/` namespace and either `-` or `_` as separator. Unrecognized codes
/// fall back to [`classify_message`].
pub fn classify_code(code: &str, message: &str) -> FailureKind {
    let normalized = code.trim().to_lowercase().replace('_', "-");
    let bare = normalized
        .strip_prefix("firestore/")
        .or_else(|| normalized.strip_prefix("auth/"))
        .unwrap_or(&normalized);

    match bare {
        "unauthenticated" | "permission-denied" | "user-token-expired"
        | "requires-recent-login" | "invalid-user-token" | "user-disabled" => FailureKind::Auth,
        "unavailable" | "deadline-exceeded" | "cancelled" | "aborted"
        | "network-request-failed" => FailureKind::Network,
        "resource-exhausted" | "quota-exceeded" | "too-many-requests" => FailureKind::Quota,
        "invalid-argument" | "not-found" | "already-exists" | "failed-precondition"
        | "out-of-range" | "data-loss" | "unimplemented" => FailureKind::Data,
        _ => classify_message(message),
    }
}

/// Best-effort classification from a free-form error message.
pub fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["unauthenticated", "unauthorized", "permission", "token", "credential", "sign in"]) {
        FailureKind::Auth
    } else if has(&["quota", "rate limit", "too many requests", "resource exhausted"]) {
        FailureKind::Quota
    } else if has(&["network", "offline", "timeout", "timed out", "unavailable", "connection", "unreachable"]) {
        FailureKind::Network
    } else if has(&["invalid", "malformed", "validation", "schema", "not found"]) {
        FailureKind::Data
    } else {
        FailureKind::Unknown
    }
}

#[cfg(test)]
#[path = "failure_tests.rs"]
mod tests;
