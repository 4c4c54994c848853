// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for offsync-core operations.

use thiserror::Error;

/// All possible errors that can occur in offsync-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid operation kind: '{0}'\n  hint: valid kinds are: save_note, delete_note, save_bookmark, delete_bookmark, update_preferences, update_profile, record_progress")]
    InvalidOperationKind(String),

    #[error("invalid failure kind: '{0}'\n  hint: valid kinds are: auth, network, quota, data, unknown")]
    InvalidFailureKind(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted record: {0}")]
    CorruptedRecord(String),
}

/// A specialized Result type for offsync-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
