// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Derived sync status, feature availability, and drain results.
//!
//! Nothing in this module owns durable state. [`SyncStatus`] and
//! [`OfflineFeatures`] are projections recomputed from the network monitor and
//! the operation queue whenever either changes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::failure::{FailureKind, SyncFailure};
use crate::operation::{OperationId, OperationKind};

/// Raw connectivity as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkState {
    pub is_connected: bool,
    /// Outcome of the reachability probe; `None` when no probe is configured.
    #[serde(default)]
    pub is_internet_reachable: Option<bool>,
}

impl NetworkState {
    pub fn offline() -> Self {
        NetworkState { is_connected: false, is_internet_reachable: None }
    }

    pub fn online() -> Self {
        NetworkState { is_connected: true, is_internet_reachable: Some(true) }
    }

    /// Connected, but the reachability probe failed.
    pub fn slow() -> Self {
        NetworkState { is_connected: true, is_internet_reachable: Some(false) }
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus::from_state(self)
    }
}

/// Categorical reachability signal.
///
/// offline: not connected. online: connected and the probe succeeded (or no
/// probe is configured). slow: connected but the probe explicitly failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Offline,
    Slow,
    Online,
}

impl ConnectionStatus {
    pub fn from_state(state: &NetworkState) -> Self {
        match (state.is_connected, state.is_internet_reachable) {
            (false, _) => ConnectionStatus::Offline,
            (true, Some(false)) => ConnectionStatus::Slow,
            (true, _) => ConnectionStatus::Online,
        }
    }

    /// True for both `Slow` and `Online`.
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionStatus::Offline)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Offline => "offline",
            ConnectionStatus::Slow => "slow",
            ConnectionStatus::Online => "online",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate view of connectivity and queue health.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub connection_status: ConnectionStatus,
    pub is_syncing: bool,
    pub pending_count: usize,
    /// Queued operations that have failed at least once.
    pub failed_count: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Sync is halted until the user re-authenticates.
    #[serde(default)]
    pub auth_required: bool,
}

impl SyncStatus {
    /// Whether subscribers should hear about the change from `self` to `other`.
    ///
    /// Timestamps alone never count as a material change.
    pub fn materially_differs(&self, other: &SyncStatus) -> bool {
        self.is_online != other.is_online
            || self.is_syncing != other.is_syncing
            || self.pending_count != other.pending_count
            || self.failed_count != other.failed_count
            || self.connection_status != other.connection_status
            || self.auth_required != other.auth_required
    }
}

/// Capability flags derived from connectivity and backlog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineFeatures {
    pub read_cached_content: bool,
    pub edit_local_data: bool,
    pub queue_changes: bool,
    pub fetch_fresh_content: bool,
    pub complete_purchases: bool,
    pub stream_audio: bool,
    pub sync_account: bool,
    pub show_pending_indicator: bool,
}

/// Projects `(is_online, pending_count)` onto feature availability.
///
/// Locally servable features stay enabled regardless of backlog size.
pub fn determine_offline_features(is_online: bool, pending_count: usize) -> OfflineFeatures {
    OfflineFeatures {
        read_cached_content: true,
        edit_local_data: true,
        queue_changes: true,
        fetch_fresh_content: is_online,
        complete_purchases: is_online,
        stream_audio: is_online,
        sync_account: is_online,
        show_pending_indicator: pending_count > 0,
    }
}

/// Why an operation left the queue without succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    AuthRequired,
    Permanent,
    RetriesExhausted,
}

/// What happened to an operation after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Disposition {
    Retrying { next_retry_at: DateTime<Utc> },
    Dropped { reason: DropReason },
}

/// One failed attempt reported by a drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    pub operation_id: OperationId,
    pub kind: OperationKind,
    pub failure: SyncFailure,
    pub disposition: Disposition,
}

impl OperationError {
    pub fn failure_kind(&self) -> FailureKind {
        self.failure.kind
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self.disposition, Disposition::Dropped { .. })
    }
}

/// Aggregate result of one queue drain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncProgress {
    pub succeeded: usize,
    pub failed: usize,
    /// Operations still queued after the drain.
    pub pending: usize,
    pub errors: Vec<OperationError>,
    /// The drain did nothing because re-authentication is required.
    #[serde(default)]
    pub skipped_auth: bool,
}

impl SyncProgress {
    /// Total executor invocations made by this drain.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    /// True when some failure requires the user to sign in again.
    pub fn requires_reauth(&self) -> bool {
        self.skipped_auth
            || self.errors.iter().any(|e| e.failure.kind == FailureKind::Auth)
    }
}

/// Result of a health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub issues: Vec<String>,
}

impl HealthReport {
    pub fn from_issues(issues: Vec<String>) -> Self {
        HealthReport { healthy: issues.is_empty(), issues }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
