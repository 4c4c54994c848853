// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable operation queue.
//!
//! Every pending remote write lives in the persistent store under
//! `queue:{id}` from `enqueue` until its outcome is final. A drain loads all
//! records, attempts the ready ones through the [`RemoteExecutor`], and writes
//! each outcome back before moving on:
//!
//! - success: the record is deleted
//! - auth failure: the record is deleted and further drains are blocked until
//!   [`OperationQueue::resume_after_reauth`]
//! - permanent failure: the record is deleted and the payload logged
//! - retriable failure: the retry count and next retry time are updated and a
//!   timer is armed, or the record is deleted once the retry budget is spent
//!
//! Drains are single-flight: concurrent callers wait for the running drain to
//! finish and then drain whatever is still ready.
//!
//! Retry state that could not be written is held in memory and written again
//! at the start of every drain, so a flaky store cannot reset an operation's
//! backoff or retry budget.

mod backoff;
mod scheduler;

pub use backoff::RetryPolicy;
pub use scheduler::RetryScheduler;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use offsync_core::clock::{add_duration, until};
use offsync_core::{
    ClockSource, Disposition, DropReason, FailureKind, OperationError, OperationId,
    OperationKind, QueuedOperation, SyncFailure, SyncProgress,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::executor::{ExecuteRequest, RemoteExecutor};
use crate::listeners::{ListenerRegistry, Subscription};
use crate::store::{PersistentStore, META_AUTH_REQUIRED, META_LAST_SYNC, QUEUE_PREFIX};

/// Change signals published by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    Enqueued(OperationId),
    Removed(OperationId),
    Rescheduled {
        id: OperationId,
        next_retry_at: DateTime<Utc>,
    },
    DrainStarted,
    DrainFinished,
    AuthRequired,
    AuthCleared,
}

/// Point-in-time counters derived from the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub pending: usize,
    /// Queued operations with at least one failed attempt.
    pub failed: usize,
    /// Earliest scheduled retry.
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub is_draining: bool,
    pub auth_required: bool,
}

fn record_key(id: &OperationId) -> String {
    format!("{}{}", QUEUE_PREFIX, id)
}

/// Durable, ordered collection of pending remote-sync operations.
pub struct OperationQueue {
    store: Arc<dyn PersistentStore>,
    executor: Arc<dyn RemoteExecutor>,
    clock: Arc<dyn ClockSource>,
    policy: RetryPolicy,
    scheduler: RetryScheduler,
    drain_lock: tokio::sync::Mutex<()>,
    draining: AtomicBool,
    auth_required: AtomicBool,
    last_sync_at: Mutex<Option<DateTime<Utc>>>,
    /// Retry state not yet written to the store, by id.
    unsaved: Mutex<HashMap<OperationId, QueuedOperation>>,
    events: ListenerRegistry<QueueEvent>,
}

impl OperationQueue {
    /// Opens the queue over `store`, restoring the auth block, the last sync
    /// time, and retry timers for operations that were backing off.
    pub fn open(
        store: Arc<dyn PersistentStore>,
        executor: Arc<dyn RemoteExecutor>,
        clock: Arc<dyn ClockSource>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let auth_required = store.get(META_AUTH_REQUIRED)?.is_some();
        let last_sync_at = match store.get(META_LAST_SYNC)? {
            Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    warn!(value = %raw, error = %e, "ignoring unparseable last sync time");
                    None
                }
            },
            None => None,
        };

        let queue = OperationQueue {
            store,
            executor,
            clock,
            policy,
            scheduler: RetryScheduler::new(),
            drain_lock: tokio::sync::Mutex::new(()),
            draining: AtomicBool::new(false),
            auth_required: AtomicBool::new(auth_required),
            last_sync_at: Mutex::new(last_sync_at),
            unsaved: Mutex::new(HashMap::new()),
            events: ListenerRegistry::new(),
        };
        queue.rearm_timers()?;
        if auth_required {
            warn!("sync is blocked until the user re-authenticates");
        }
        Ok(queue)
    }

    fn rearm_timers(&self) -> Result<()> {
        let now = self.clock.now();
        let mut armed = 0;
        for op in self.load_all()? {
            if op.retry_count == 0 {
                continue;
            }
            if let Some(at) = op.next_retry_at {
                self.scheduler.schedule(op.id.clone(), until(now, at));
                armed += 1;
            }
        }
        if armed > 0 {
            debug!(armed, "restored retry timers");
        }
        Ok(())
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn scheduler(&self) -> &RetryScheduler {
        &self.scheduler
    }

    /// Starts the retry timer task; due ids arrive on `due_tx`.
    pub fn spawn_scheduler(
        &self,
        due_tx: mpsc::Sender<OperationId>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        self.scheduler.spawn(due_tx, cancel)
    }

    /// Registers a listener for queue change signals.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Persists a new operation and returns its id without attempting it.
    pub fn enqueue(&self, kind: OperationKind, payload: serde_json::Value) -> Result<OperationId> {
        let now = self.clock.now();
        let id = OperationId::generate_unique(kind, &now, |candidate| {
            matches!(self.store.get(&record_key(candidate)), Ok(Some(_)))
        });

        let op = QueuedOperation::new(id.clone(), kind, payload, now);
        self.persist(&op)?;
        info!(id = %id, kind = %kind, "operation enqueued");
        self.events.emit(&QueueEvent::Enqueued(id.clone()));
        Ok(id)
    }

    /// Attempts every ready operation and reports the aggregate outcome.
    ///
    /// Never fails: each outcome is recorded on its operation and folded into
    /// the returned progress.
    pub async fn process_queue(&self) -> SyncProgress {
        let _guard = self.drain_lock.lock().await;

        if self.auth_required() {
            debug!("drain skipped: re-authentication required");
            return SyncProgress {
                pending: self.pending_count(),
                skipped_auth: true,
                ..SyncProgress::default()
            };
        }

        let _draining = DrainingGuard::begin(self);
        self.drain().await
    }

    async fn drain(&self) -> SyncProgress {
        let mut progress = SyncProgress::default();
        self.flush_unsaved();

        let ops = match self.load_all() {
            Ok(ops) => ops,
            Err(e) => {
                error!(error = %e, "failed to load queue; drain aborted");
                return progress;
            }
        };

        let now = self.clock.now();
        let (ready, waiting): (Vec<_>, Vec<_>) = ops.into_iter().partition(|op| op.is_ready(now));
        debug!(ready = ready.len(), waiting = waiting.len(), "draining queue");
        self.ensure_timers(&waiting, now);

        for op in ready {
            // An auth failure earlier in this drain halts the rest
            if self.auth_required() {
                break;
            }
            // Removed by the user since the drain started
            if !matches!(self.store.get(&record_key(&op.id)), Ok(Some(_))) {
                continue;
            }

            match self.executor.execute(ExecuteRequest::from(&op)).await {
                Ok(()) => {
                    debug!(id = %op.id, kind = %op.kind, "operation synced");
                    self.discard(&op.id);
                    progress.succeeded += 1;
                }
                Err(failure) => {
                    progress.failed += 1;
                    progress.errors.push(self.record_failure(op, failure));
                }
            }
        }

        progress.pending = self.pending_count();
        if progress.succeeded > 0 || progress.pending == 0 {
            self.mark_synced();
        }
        if progress.attempted() > 0 {
            info!(
                succeeded = progress.succeeded,
                failed = progress.failed,
                pending = progress.pending,
                "queue drained"
            );
        }
        progress
    }

    /// Applies the outcome rule for a failed attempt.
    fn record_failure(&self, mut op: QueuedOperation, failure: SyncFailure) -> OperationError {
        let at = self.clock.now();

        let disposition = if failure.kind == FailureKind::Auth {
            warn!(id = %op.id, kind = %op.kind, error = %failure, "authentication rejected; dropping operation and halting sync");
            self.discard(&op.id);
            self.set_auth_required(true);
            Disposition::Dropped { reason: DropReason::AuthRequired }
        } else if !failure.is_retriable() {
            error!(id = %op.id, kind = %op.kind, payload = %op.payload, error = %failure, "operation rejected permanently; dropping");
            self.discard(&op.id);
            Disposition::Dropped { reason: DropReason::Permanent }
        } else if self.policy.allows_retry(op.retry_count) {
            let delay = self.policy.delay_for(failure.kind, op.retry_count + 1);
            op.record_failure(&failure, at, add_duration(at, delay));
            let next_retry_at = op.next_retry_at.unwrap_or(at);

            match self.persist(&op) {
                Ok(()) => {
                    self.lock_unsaved().remove(&op.id);
                }
                Err(e) => {
                    error!(id = %op.id, error = %e, "failed to persist retry state; holding it in memory");
                    self.lock_unsaved().insert(op.id.clone(), op.clone());
                }
            }
            self.scheduler.schedule(op.id.clone(), until(at, next_retry_at));
            warn!(
                id = %op.id,
                retry = op.retry_count,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "operation failed; will retry"
            );
            self.events.emit(&QueueEvent::Rescheduled { id: op.id.clone(), next_retry_at });
            Disposition::Retrying { next_retry_at }
        } else {
            error!(id = %op.id, kind = %op.kind, attempts = op.retry_count + 1, error = %failure, "operation failed on its final attempt; dropping");
            self.discard(&op.id);
            Disposition::Dropped { reason: DropReason::RetriesExhausted }
        };

        OperationError {
            operation_id: op.id,
            kind: op.kind,
            failure,
            disposition,
        }
    }

    /// Manually attempts one operation if it is currently ready.
    ///
    /// Returns `Ok(true)` only when the attempt succeeded. An operation that is
    /// still backing off (or a queue blocked on re-authentication) yields
    /// `Ok(false)` without side effects.
    pub async fn retry_operation(&self, id: &OperationId) -> Result<bool> {
        let _guard = self.drain_lock.lock().await;

        self.flush_unsaved();
        let op = self.load(id)?.ok_or_else(|| Error::OperationNotFound(id.to_string()))?;
        if self.auth_required() || !op.is_ready(self.clock.now()) {
            return Ok(false);
        }

        let _draining = DrainingGuard::begin(self);
        match self.executor.execute(ExecuteRequest::from(&op)).await {
            Ok(()) => {
                info!(id = %op.id, "operation synced on manual retry");
                self.discard(&op.id);
                self.mark_synced();
                Ok(true)
            }
            Err(failure) => {
                self.record_failure(op, failure);
                Ok(false)
            }
        }
    }

    /// Deletes an operation regardless of its state. Returns whether it existed.
    pub fn remove_from_queue(&self, id: &OperationId) -> Result<bool> {
        let key = record_key(id);
        let existed = self.store.get(&key)?.is_some();
        self.scheduler.cancel(id);
        self.lock_unsaved().remove(id);
        self.store.remove(&key)?;
        if existed {
            info!(id = %id, "operation removed from queue");
            self.events.emit(&QueueEvent::Removed(id.clone()));
        }
        Ok(existed)
    }

    /// All pending operations, oldest first.
    pub fn get_queued_operations(&self) -> Result<Vec<QueuedOperation>> {
        self.load_all()
    }

    pub fn snapshot(&self) -> Result<QueueSnapshot> {
        let ops = self.load_all()?;
        let backing_off = || ops.iter().filter(|op| op.retry_count > 0);
        Ok(QueueSnapshot {
            pending: ops.len(),
            failed: backing_off().count(),
            next_retry_at: backing_off().filter_map(|op| op.next_retry_at).min(),
            last_sync_at: self.last_sync_at(),
            is_draining: self.is_draining(),
            auth_required: self.auth_required(),
        })
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    pub fn auth_required(&self) -> bool {
        self.auth_required.load(Ordering::SeqCst)
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        *self.last_sync_at.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lifts the block set by an auth failure.
    pub fn resume_after_reauth(&self) {
        if self.auth_required() {
            info!("re-authenticated; sync resumed");
        }
        self.set_auth_required(false);
    }

    fn set_auth_required(&self, required: bool) {
        let persisted = if required {
            self.store.set(META_AUTH_REQUIRED, &self.clock.now().to_rfc3339())
        } else {
            self.store.remove(META_AUTH_REQUIRED)
        };
        if let Err(e) = persisted {
            warn!(error = %e, "failed to persist auth state");
        }

        let was = self.auth_required.swap(required, Ordering::SeqCst);
        if was != required {
            self.events.emit(if required {
                &QueueEvent::AuthRequired
            } else {
                &QueueEvent::AuthCleared
            });
        }
    }

    fn mark_synced(&self) {
        let now = self.clock.now();
        *self.last_sync_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);
        if let Err(e) = self.store.set(META_LAST_SYNC, &now.to_rfc3339()) {
            warn!(error = %e, "failed to persist last sync time");
        }
    }

    fn pending_count(&self) -> usize {
        match self.load_all() {
            Ok(ops) => ops.len(),
            Err(e) => {
                warn!(error = %e, "failed to count queued operations");
                0
            }
        }
    }

    fn discard(&self, id: &OperationId) {
        self.scheduler.cancel(id);
        self.lock_unsaved().remove(id);
        if let Err(e) = self.store.remove(&record_key(id)) {
            error!(id = %id, error = %e, "failed to delete operation; it may be executed again");
        }
        self.events.emit(&QueueEvent::Removed(id.clone()));
    }

    /// Re-arms timers for backing-off operations that have none, e.g. after
    /// a timer fired while the wall clock said the retry was not yet due.
    fn ensure_timers(&self, waiting: &[QueuedOperation], now: DateTime<Utc>) {
        for op in waiting {
            let Some(at) = op.next_retry_at else {
                continue;
            };
            if op.retry_count > 0 && at > now && !self.scheduler.is_scheduled(&op.id) {
                debug!(id = %op.id, "re-arming retry timer");
                self.scheduler.schedule(op.id.clone(), until(now, at));
            }
        }
    }

    /// Writes held retry state; entries that still fail stay held.
    fn flush_unsaved(&self) {
        let held: Vec<QueuedOperation> = self.lock_unsaved().values().cloned().collect();
        for op in held {
            match self.persist(&op) {
                Ok(()) => {
                    self.lock_unsaved().remove(&op.id);
                    debug!(id = %op.id, "retry state written");
                }
                Err(e) => warn!(id = %op.id, error = %e, "retry state still not written"),
            }
        }
    }

    fn lock_unsaved(&self) -> MutexGuard<'_, HashMap<OperationId, QueuedOperation>> {
        self.unsaved.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, op: &QueuedOperation) -> Result<()> {
        self.store.set(&record_key(&op.id), &op.to_json()?)?;
        Ok(())
    }

    fn load(&self, id: &OperationId) -> Result<Option<QueuedOperation>> {
        let Some(raw) = self.store.get(&record_key(id))? else {
            return Ok(None);
        };
        if let Some(held) = self.lock_unsaved().get(id) {
            return Ok(Some(held.clone()));
        }
        Ok(Some(QueuedOperation::from_json(&raw)?))
    }

    fn load_all(&self) -> Result<Vec<QueuedOperation>> {
        let keys = self.store.list_keys(QUEUE_PREFIX)?;
        let mut ops = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(raw) = self.store.get(&key)? else {
                continue;
            };
            match QueuedOperation::from_json(&raw) {
                Ok(op) => ops.push(op),
                Err(e) => warn!(key = %key, error = %e, "skipping corrupt queue record"),
            }
        }
        {
            let held = self.lock_unsaved();
            for op in ops.iter_mut() {
                if let Some(newer) = held.get(&op.id) {
                    *op = newer.clone();
                }
            }
        }
        ops.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(ops)
    }
}

/// Holds the draining flag for the duration of a drain, including when the
/// drain future is dropped mid-flight.
struct DrainingGuard<'a> {
    queue: &'a OperationQueue,
}

impl<'a> DrainingGuard<'a> {
    fn begin(queue: &'a OperationQueue) -> Self {
        queue.draining.store(true, Ordering::SeqCst);
        queue.events.emit(&QueueEvent::DrainStarted);
        DrainingGuard { queue }
    }
}

impl Drop for DrainingGuard<'_> {
    fn drop(&mut self) {
        self.queue.draining.store(false, Ordering::SeqCst);
        self.queue.events.emit(&QueueEvent::DrainFinished);
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
