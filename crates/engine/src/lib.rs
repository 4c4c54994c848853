// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! offsync: Offline synchronization engine.
//!
//! Keeps local state usable while intermittently connected and propagates
//! local writes to a remote store once connectivity returns.
//!
//! # Main Components
//!
//! - [`CacheEngine`] - two-tier (memory + persistent) cache with per-entry TTL
//! - [`OperationQueue`] - durable queue of pending remote writes with retry/backoff
//! - [`StatusCoordinator`] - folds network and queue state into one [`SyncStatus`]
//! - [`SyncContext`] - the handle that owns all of the above
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  on_change   ┌───────────────────┐  drain   ┌────────────────┐
//! │NetworkMonitor│─────────────►│ StatusCoordinator │─────────►│ OperationQueue │
//! └──────────────┘              └───────────────────┘◄─────────└────────────────┘
//!                                                    QueueEvent  │    │ execute
//!                               ┌─────────────┐                  │    ▼
//!                               │ CacheEngine │                  │ ┌────────────────┐
//!                               └──────┬──────┘                  │ │ RemoteExecutor │
//!                                      ▼                         ▼ └────────────────┘
//!                               ┌────────────────────────────────────┐
//!                               │          PersistentStore           │
//!                               └────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod listeners;
pub mod network;
pub mod queue;
pub mod store;

#[cfg(test)]
mod test_helpers;


pub use cache::{CacheEngine, CacheStats};
pub use config::{CacheConfig, CoordinatorConfig, EngineConfig, HealthConfig, QueueConfig};
pub use context::{SyncContext, SyncContextBuilder};
pub use coordinator::StatusCoordinator;
pub use error::{Error, Result};
pub use executor::{ExecuteRequest, RemoteExecutor, TransportExecutor, WebSocketTransport};
pub use listeners::{ListenerRegistry, Subscription};
pub use network::{ManualNetworkMonitor, NetworkMonitor};
pub use queue::{OperationQueue, QueueEvent, QueueSnapshot, RetryPolicy};
pub use store::{MemoryStore, PersistentStore, SqliteStore, StoreError};

pub use offsync_core::{
    ConnectionStatus, FailureKind, HealthReport, NetworkState, OfflineFeatures, OperationId,
    OperationKind, QueuedOperation, SyncFailure, SyncProgress, SyncStatus,
};
