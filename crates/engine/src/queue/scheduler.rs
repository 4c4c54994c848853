// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Retry timers.
//!
//! One cancellable deadline per backing-off operation, kept in a min-heap.
//! A single background task sleeps until the earliest live deadline and
//! reports due operation ids over a channel. Rescheduling an id replaces its
//! previous deadline; cancelled entries are discarded lazily when they reach
//! the top of the heap.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use offsync_core::OperationId;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Default)]
struct TimerState {
    heap: BinaryHeap<Reverse<(Instant, u64, OperationId)>>,
    /// Generation of the live timer for each id.
    live: HashMap<OperationId, u64>,
    next_generation: u64,
}

impl TimerState {
    /// Drops cancelled or superseded entries from the top of the heap.
    fn prune(&mut self) {
        while let Some(Reverse((_, generation, id))) = self.heap.peek() {
            if self.live.get(id) == Some(generation) {
                break;
            }
            self.heap.pop();
        }
    }

    fn take_due(&mut self, now: Instant) -> Vec<OperationId> {
        let mut due = Vec::new();
        loop {
            self.prune();
            match self.heap.peek() {
                Some(Reverse((deadline, _, _))) if *deadline <= now => {
                    if let Some(Reverse((_, _, id))) = self.heap.pop() {
                        self.live.remove(&id);
                        due.push(id);
                    }
                }
                _ => break,
            }
        }
        due
    }

    fn next_deadline(&mut self) -> Option<Instant> {
        self.prune();
        self.heap.peek().map(|Reverse((deadline, _, _))| *deadline)
    }
}

struct SchedulerInner {
    state: Mutex<TimerState>,
    wake: Notify,
}

/// Addressable, cancellable delay tasks keyed by operation id.
#[derive(Clone)]
pub struct RetryScheduler {
    inner: Arc<SchedulerInner>,
}

impl RetryScheduler {
    pub fn new() -> Self {
        RetryScheduler {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(TimerState::default()),
                wake: Notify::new(),
            }),
        }
    }

    /// Arms (or re-arms) the timer for `id` to fire after `delay`.
    pub fn schedule(&self, id: OperationId, delay: Duration) {
        let deadline = Instant::now() + delay;
        {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            let generation = state.next_generation;
            state.next_generation += 1;
            state.live.insert(id.clone(), generation);
            state.heap.push(Reverse((deadline, generation, id)));
        }
        self.inner.wake.notify_one();
    }

    /// Disarms the timer for `id`. Returns whether one was armed.
    pub fn cancel(&self, id: &OperationId) -> bool {
        let removed = self
            .inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .live
            .remove(id)
            .is_some();
        if removed {
            self.inner.wake.notify_one();
        }
        removed
    }

    /// Disarms every timer.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.live.clear();
        state.heap.clear();
    }

    pub fn is_scheduled(&self, id: &OperationId) -> bool {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner()).live.contains_key(id)
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner()).live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts the timer task. Due ids are sent on `due_tx` until `cancel` fires
    /// or the receiver is dropped.
    pub fn spawn(
        &self,
        due_tx: mpsc::Sender<OperationId>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                let (due, next) = {
                    let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
                    let due = state.take_due(Instant::now());
                    (due, state.next_deadline())
                };

                for id in due {
                    debug!(id = %id, "retry timer fired");
                    if due_tx.send(id).await.is_err() {
                        return;
                    }
                }

                let sleep = async {
                    match next {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = inner.wake.notified() => {}
                    _ = sleep => {}
                }
            }
        })
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
