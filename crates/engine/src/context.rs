// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine handle.
//!
//! A [`SyncContext`] is built once at startup and owns the store, cache, queue
//! and coordinator. Consumers receive the handle (or an `Arc` of it) instead of
//! reaching for process-wide state.
//!
//! ```ignore
//! let ctx = SyncContext::builder()
//!     .config(EngineConfig::load(&path)?)
//!     .store(Arc::new(SqliteStore::open(&db_path)?))
//!     .executor(Arc::new(TransportExecutor::websocket(url, timeout)))
//!     .network(monitor.clone())
//!     .build()?;
//! ctx.start();
//! // ...
//! ctx.shutdown().await;
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use offsync_core::{
    ClockSource, HealthReport, OfflineFeatures, OperationId, OperationKind, QueuedOperation,
    SyncProgress, SyncStatus, SystemClock,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{CacheEngine, CacheStats};
use crate::config::EngineConfig;
use crate::coordinator::StatusCoordinator;
use crate::error::{Error, Result};
use crate::executor::RemoteExecutor;
use crate::listeners::Subscription;
use crate::network::{ManualNetworkMonitor, NetworkMonitor};
use crate::queue::OperationQueue;
use crate::store::{MemoryStore, PersistentStore};

/// Due retry ids buffered between the scheduler and the coordinator.
const DUE_CHANNEL_CAPACITY: usize = 64;

/// Builder for [`SyncContext`].
///
/// Only the executor is required. Defaults: in-memory store, a monitor that
/// reports offline until told otherwise, and the system clock.
#[derive(Default)]
pub struct SyncContextBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn PersistentStore>>,
    executor: Option<Arc<dyn RemoteExecutor>>,
    network: Option<Arc<dyn NetworkMonitor>>,
    clock: Option<Arc<dyn ClockSource>>,
}

impl SyncContextBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn RemoteExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn network(mut self, network: Arc<dyn NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validates the configuration and wires the components together.
    ///
    /// Opening the queue restores persisted retry timers and the auth block.
    pub fn build(self) -> Result<SyncContext> {
        self.config.validate()?;
        let executor = self
            .executor
            .ok_or_else(|| Error::Config("a remote executor is required".to_string()))?;
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let network = self
            .network
            .unwrap_or_else(|| Arc::new(ManualNetworkMonitor::default()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let queue = Arc::new(OperationQueue::open(
            Arc::clone(&store),
            executor,
            Arc::clone(&clock),
            self.config.queue.policy(),
        )?);
        let cache = Arc::new(CacheEngine::new(Arc::clone(&store), clock, &self.config.cache));
        let coordinator = StatusCoordinator::new(
            Arc::clone(&network),
            Arc::clone(&queue),
            Arc::clone(&cache),
            &self.config,
        );

        Ok(SyncContext {
            config: self.config,
            store,
            network,
            cache,
            queue,
            coordinator,
            running: Mutex::new(None),
        })
    }
}

struct Running {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Handle owning every engine component and its background tasks.
pub struct SyncContext {
    config: EngineConfig,
    store: Arc<dyn PersistentStore>,
    network: Arc<dyn NetworkMonitor>,
    cache: Arc<CacheEngine>,
    queue: Arc<OperationQueue>,
    coordinator: Arc<StatusCoordinator>,
    running: Mutex<Option<Running>>,
}

impl SyncContext {
    pub fn builder() -> SyncContextBuilder {
        SyncContextBuilder::default()
    }

    /// Spawns the retry scheduler, cache sweeper and coordinator loop.
    ///
    /// Must be called within a tokio runtime. Calling it again while running
    /// does nothing.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let (due_tx, due_rx) = mpsc::channel(DUE_CHANNEL_CAPACITY);
        let tasks = vec![
            self.queue.spawn_scheduler(due_tx, cancel.clone()),
            self.cache
                .spawn_sweeper(self.config.cache.sweep_interval(), cancel.clone()),
            tokio::spawn(Arc::clone(&self.coordinator).run(due_rx, cancel.clone())),
        ];
        *running = Some(Running { cancel, tasks });
        info!("sync engine started");
    }

    /// Stops all background tasks and waits for them to exit.
    ///
    /// An in-flight drain is abandoned at its current await point; the
    /// operation it was executing stays queued and is retried later with the
    /// same idempotency key.
    pub async fn shutdown(&self) {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(running) = running else {
            return;
        };

        running.cancel.cancel();
        for task in running.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        info!("sync engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    pub fn network(&self) -> &Arc<dyn NetworkMonitor> {
        &self.network
    }

    pub fn cache(&self) -> &Arc<CacheEngine> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<OperationQueue> {
        &self.queue
    }

    pub fn coordinator(&self) -> &Arc<StatusCoordinator> {
        &self.coordinator
    }

    pub fn enqueue(&self, kind: OperationKind, payload: serde_json::Value) -> Result<OperationId> {
        self.queue.enqueue(kind, payload)
    }

    /// Drains the queue regardless of connectivity.
    pub async fn process_queue(&self) -> SyncProgress {
        self.queue.process_queue().await
    }

    pub async fn trigger_sync(&self) -> SyncProgress {
        self.coordinator.trigger_sync().await
    }

    pub async fn wait_for_sync(&self, timeout: Duration) -> bool {
        self.coordinator.wait_for_sync(timeout).await
    }

    pub fn queued_operations(&self) -> Result<Vec<QueuedOperation>> {
        self.queue.get_queued_operations()
    }

    pub fn remove_operation(&self, id: &OperationId) -> Result<bool> {
        self.queue.remove_from_queue(id)
    }

    pub async fn retry_operation(&self, id: &OperationId) -> Result<bool> {
        self.queue.retry_operation(id).await
    }

    pub fn resume_after_reauth(&self) {
        self.queue.resume_after_reauth();
        self.coordinator.refresh();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn check_health(&self) -> HealthReport {
        self.coordinator.check_health()
    }

    pub fn status(&self) -> SyncStatus {
        self.coordinator.status()
    }

    pub fn features(&self) -> OfflineFeatures {
        self.coordinator.features()
    }

    pub fn on_status_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.coordinator.on_status_change(listener)
    }
}

impl Drop for SyncContext {
    fn drop(&mut self) {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(running) = running {
            running.cancel.cancel();
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
