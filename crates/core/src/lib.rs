// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! offsync-core: Shared data model for the offline synchronization engine.
//!
//! This crate holds the pure types shared by the engine and the CLI: queued
//! operations and their ids, the failure taxonomy and its classifier, the
//! derived sync status and feature projection, the injectable clock, and the
//! wire protocol spoken by the WebSocket executor.

pub mod clock;
pub mod entry;
pub mod error;
pub mod failure;
pub mod operation;
pub mod protocol;
pub mod status;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use error::{Error, Result};
pub use failure::{classify_code, classify_message, FailureKind, SyncFailure};
pub use operation::{LastError, OperationId, OperationKind, QueuedOperation};
pub use status::{
    determine_offline_features, ConnectionStatus, Disposition, DropReason, HealthReport,
    NetworkState, OfflineFeatures, OperationError, SyncProgress, SyncStatus,
};
