// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command handlers.
//!
//! Every command opens a [`Session`] over the SQLite database in the state
//! directory. Background tasks are not started: each invocation does its work
//! in the foreground and exits.

pub mod cache;
pub mod queue;
pub mod status;
pub mod sync;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use offsync::executor::ExecuteFuture;
use offsync::{
    ExecuteRequest, ManualNetworkMonitor, NetworkState, RemoteExecutor, SqliteStore,
    SyncContext, SyncFailure, TransportExecutor,
};
use tracing::debug;

use crate::cli::{CacheCommand, Command, QueueCommand};
use crate::config::{Config, DB_FILE_NAME};
use crate::error::{Error, Result};

/// Stands in for the executor when no remote is configured.
///
/// Commands that reach the remote check [`Session::require_remote`] first,
/// so this is only hit through the engine's own retry paths.
struct UnconfiguredRemote;

impl RemoteExecutor for UnconfiguredRemote {
    fn execute(&self, _request: ExecuteRequest) -> ExecuteFuture<'_> {
        Box::pin(async { Err(SyncFailure::network("no remote configured")) })
    }
}

/// An open engine plus the run-wide flags commands need.
pub struct Session {
    pub ctx: SyncContext,
    pub offline: bool,
    remote_configured: bool,
}

impl Session {
    pub fn open(config: &Config, state_dir: &Path, offline: bool) -> Result<Self> {
        fs::create_dir_all(state_dir)?;
        let db_path = state_dir.join(DB_FILE_NAME);
        debug!("opening {}", db_path.display());
        let store = SqliteStore::open(&db_path)?;

        let executor: Arc<dyn RemoteExecutor> = match &config.remote {
            Some(remote) => Arc::new(TransportExecutor::websocket(
                remote.url.clone(),
                remote.response_timeout(),
            )),
            None => Arc::new(UnconfiguredRemote),
        };
        let network = ManualNetworkMonitor::new(if offline {
            NetworkState::offline()
        } else {
            NetworkState::online()
        });

        let ctx = SyncContext::builder()
            .config(config.engine.clone())
            .store(Arc::new(store))
            .executor(executor)
            .network(Arc::new(network))
            .build()?;
        Ok(Session { ctx, offline, remote_configured: config.remote.is_some() })
    }

    /// Fails with [`Error::NoRemote`] unless a remote is configured.
    pub fn require_remote(&self) -> Result<()> {
        if self.remote_configured {
            Ok(())
        } else {
            Err(Error::NoRemote)
        }
    }
}

pub async fn run(command: Command, config: &Config, state_dir: &Path, offline: bool) -> Result<()> {
    let session = Session::open(config, state_dir, offline)?;
    match command {
        Command::Status { output } => status::status(&session, output),
        Command::Health { output } => status::health(&session, output),
        Command::Enqueue { kind, payload } => queue::enqueue(&session, &kind, &payload),
        Command::Queue(cmd) => match cmd {
            QueueCommand::List { output } => queue::list(&session, output),
            QueueCommand::Remove { id } => queue::remove(&session, &id),
            QueueCommand::Retry { id } => queue::retry(&session, &id).await,
            QueueCommand::Resume => queue::resume(&session),
        },
        Command::Sync { timeout_ms } => sync::sync(&session, timeout_ms).await,
        Command::Cache(cmd) => match cmd {
            CacheCommand::Put { key, value, ttl_ms } => {
                cache::put(&session, &key, &value, ttl_ms)
            }
            CacheCommand::Get { key } => cache::get(&session, &key),
            CacheCommand::Remove { key } => cache::remove(&session, &key),
            CacheCommand::Stats { output } => cache::stats(&session, output),
            CacheCommand::Sweep => cache::sweep(&session),
            CacheCommand::Clear => cache::clear(&session),
        },
    }
}
