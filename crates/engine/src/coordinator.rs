// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Status coordinator.
//!
//! Folds network state, queue counters and cache health into one
//! [`SyncStatus`], notifies subscribers when it materially changes, and
//! decides when the queue drains on its own:
//!
//! - on a transition into [`ConnectionStatus::Online`]
//! - when a retry timer fires while connected
//! - when an operation is enqueued while connected (`drain_on_enqueue`)
//! - once at startup when online with a non-empty queue
//!
//! Drain requests are coalesced: any number of requests arriving while a
//! drain is pending or running produce at most one follow-up drain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use offsync_core::{
    determine_offline_features, ConnectionStatus, HealthReport, NetworkState, OfflineFeatures,
    OperationId, SyncProgress, SyncStatus,
};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::CacheEngine;
use crate::config::{EngineConfig, HealthConfig};
use crate::listeners::{ListenerRegistry, Subscription};
use crate::network::NetworkMonitor;
use crate::queue::{OperationQueue, QueueEvent, QueueSnapshot};

/// Aggregates engine state and drives automatic queue drains.
pub struct StatusCoordinator {
    network: Arc<dyn NetworkMonitor>,
    queue: Arc<OperationQueue>,
    cache: Arc<CacheEngine>,
    health: HealthConfig,
    drain_on_enqueue: bool,
    connection: Mutex<ConnectionStatus>,
    status: Mutex<SyncStatus>,
    listeners: ListenerRegistry<SyncStatus>,
    drain_requested: Notify,
    auto_drains: AtomicUsize,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl StatusCoordinator {
    /// Creates the coordinator and subscribes it to network and queue changes.
    pub fn new(
        network: Arc<dyn NetworkMonitor>,
        queue: Arc<OperationQueue>,
        cache: Arc<CacheEngine>,
        config: &EngineConfig,
    ) -> Arc<Self> {
        let coordinator = Arc::new(StatusCoordinator {
            network,
            queue,
            cache,
            health: config.health.clone(),
            drain_on_enqueue: config.coordinator.drain_on_enqueue,
            connection: Mutex::new(ConnectionStatus::Offline),
            status: Mutex::new(SyncStatus::default()),
            listeners: ListenerRegistry::new(),
            drain_requested: Notify::new(),
            auto_drains: AtomicUsize::new(0),
            subscriptions: Mutex::new(Vec::new()),
        });
        coordinator.attach();
        // Seeded after subscribing so a change during attach is not lost
        let connection = coordinator.network.current_state().connection_status();
        *coordinator.lock_connection() = connection;
        coordinator.refresh();
        coordinator
    }

    fn attach(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let network = self.network.on_change(Box::new(move |state| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.handle_network(state);
            }
        }));

        let weak = Arc::downgrade(self);
        let queue = self.queue.subscribe(move |event| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.handle_queue_event(event);
            }
        });

        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend([network, queue]);
    }

    fn handle_network(&self, state: &NetworkState) {
        let next = state.connection_status();
        let previous = std::mem::replace(&mut *self.lock_connection(), next);
        if previous != next {
            info!(from = %previous, to = %next, "connection status changed");
            if next == ConnectionStatus::Online {
                self.request_drain();
            }
        }
        self.refresh();
    }

    fn handle_queue_event(&self, event: &QueueEvent) {
        if let QueueEvent::Enqueued(id) = event {
            if self.drain_on_enqueue && self.is_connected() {
                debug!(id = %id, "enqueued while connected; requesting drain");
                self.request_drain();
            }
        }
        self.refresh();
    }

    fn request_drain(&self) {
        self.drain_requested.notify_one();
    }

    fn connection_status(&self) -> ConnectionStatus {
        *self.lock_connection()
    }

    fn is_connected(&self) -> bool {
        self.connection_status().is_connected()
    }

    /// Current status, recomputed from its sources.
    pub fn status(&self) -> SyncStatus {
        self.refresh()
    }

    /// Recomputes the status and notifies subscribers if it materially changed.
    pub fn refresh(&self) -> SyncStatus {
        let (next, changed) = {
            let mut current = self.status.lock().unwrap_or_else(|e| e.into_inner());
            let next = self.compute(&current);
            let changed = current.materially_differs(&next);
            *current = next.clone();
            (next, changed)
        };
        if changed {
            debug!(
                online = next.is_online,
                syncing = next.is_syncing,
                pending = next.pending_count,
                failed = next.failed_count,
                "sync status changed"
            );
            self.listeners.emit(&next);
        }
        next
    }

    fn compute(&self, previous: &SyncStatus) -> SyncStatus {
        let connection = self.connection_status();
        let snapshot = self.queue.snapshot().unwrap_or_else(|e| {
            warn!(error = %e, "queue unreadable; keeping previous counts");
            QueueSnapshot {
                pending: previous.pending_count,
                failed: previous.failed_count,
                next_retry_at: previous.next_retry_at,
                last_sync_at: self.queue.last_sync_at(),
                is_draining: self.queue.is_draining(),
                auth_required: self.queue.auth_required(),
            }
        });

        SyncStatus {
            is_online: connection.is_connected(),
            connection_status: connection,
            is_syncing: snapshot.is_draining,
            pending_count: snapshot.pending,
            failed_count: snapshot.failed,
            last_sync_at: snapshot.last_sync_at,
            next_retry_at: snapshot.next_retry_at,
            auth_required: snapshot.auth_required,
        }
    }

    /// Registers a listener called with each materially changed status.
    pub fn on_status_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Drains the queue now and returns the outcome.
    ///
    /// Does nothing while offline.
    pub async fn trigger_sync(&self) -> SyncProgress {
        if !self.is_connected() {
            debug!("sync skipped: offline");
            return SyncProgress {
                pending: self.status().pending_count,
                ..SyncProgress::default()
            };
        }
        let progress = self.queue.process_queue().await;
        self.refresh();
        progress
    }

    /// Waits until no drain is running. Returns false if `timeout` elapses first.
    pub async fn wait_for_sync(&self, timeout: Duration) -> bool {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let subscription = self.queue.subscribe(move |event| {
            if *event == QueueEvent::DrainFinished {
                if let Some(tx) = tx.lock().unwrap_or_else(|e| e.into_inner()).take() {
                    let _ = tx.send(());
                }
            }
        });

        // Checked after subscribing so a drain finishing in between is seen
        if !self.queue.is_draining() {
            subscription.unsubscribe();
            return true;
        }

        let finished = matches!(tokio::time::timeout(timeout, rx).await, Ok(Ok(())));
        subscription.unsubscribe();
        finished
    }

    pub fn features(&self) -> OfflineFeatures {
        let status = self.status();
        determine_offline_features(status.is_online, status.pending_count)
    }

    /// Reports unhealthy when storage is unreadable, cache writes are not
    /// persisting, sync is blocked on auth, or backlog exceeds its thresholds.
    pub fn check_health(&self) -> HealthReport {
        let mut issues = Vec::new();

        match self.queue.snapshot() {
            Ok(snapshot) => {
                if snapshot.pending > self.health.max_pending {
                    issues.push(format!(
                        "{} operations pending (threshold {})",
                        snapshot.pending, self.health.max_pending
                    ));
                }
                if snapshot.failed > self.health.max_failed {
                    issues.push(format!(
                        "{} operations failing (threshold {})",
                        snapshot.failed, self.health.max_failed
                    ));
                }
                if snapshot.auth_required {
                    issues.push("sync halted until re-authentication".to_string());
                }
            }
            Err(e) => issues.push(format!("operation queue unavailable: {}", e)),
        }

        let cache = self.cache.stats();
        if cache.persist_failures > 0 {
            issues.push(format!(
                "cache persistence degraded ({} failed writes)",
                cache.persist_failures
            ));
        }

        HealthReport::from_issues(issues)
    }

    /// Number of drains started by the coordinator itself.
    pub fn auto_drain_count(&self) -> usize {
        self.auto_drains.load(Ordering::SeqCst)
    }

    /// Runs automatic drains until `cancel` fires.
    ///
    /// `due_rx` carries ids from the queue's retry scheduler. Cancelling stops
    /// an in-flight drain at its next await point.
    pub async fn run(self: Arc<Self>, mut due_rx: mpsc::Receiver<OperationId>, cancel: CancellationToken) {
        if self.connection_status() == ConnectionStatus::Online && self.status().pending_count > 0 {
            self.request_drain();
        }

        let mut timers_open = true;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.drain_requested.notified() => {}
                due = due_rx.recv(), if timers_open => match due {
                    Some(id) => debug!(id = %id, "retry timer fired"),
                    None => {
                        timers_open = false;
                        continue;
                    }
                },
            }

            // Timers that fired together share one drain
            while due_rx.try_recv().is_ok() {}

            if !self.is_connected() {
                debug!("drain deferred until reconnect");
                continue;
            }

            self.auto_drains.fetch_add(1, Ordering::SeqCst);
            tokio::select! {
                _ = cancel.cancelled() => break,
                progress = self.queue.process_queue() => {
                    if progress.requires_reauth() {
                        warn!("automatic sync stopped: re-authentication required");
                    }
                    self.refresh();
                }
            }
        }
        debug!("status coordinator stopped");
    }

    fn lock_connection(&self) -> std::sync::MutexGuard<'_, ConnectionStatus> {
        self.connection.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
