// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use offsync_core::clock::add_duration;
use offsync_core::{ClockSource, OperationId, SyncFailure};

use crate::executor::{ExecuteFuture, ExecuteRequest, RemoteExecutor};
use crate::store::{MemoryStore, PersistentStore, StoreError, StoreResult};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

/// Wall clock that advances with tokio's (possibly paused) clock, so retry
/// timers and readiness checks agree in `start_paused` tests.
pub struct TokioClock {
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Arc<Self> {
        Arc::new(TokioClock { started: tokio::time::Instant::now() })
    }
}

impl ClockSource for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        add_duration(t0(), self.started.elapsed())
    }
}

/// Executor with scripted outcomes.
///
/// Each id can be given a sequence of outcomes; once exhausted (or for
/// unscripted ids) the default outcome applies.
pub struct MockExecutor {
    default: Mutex<Result<(), SyncFailure>>,
    scripted: Mutex<HashMap<OperationId, VecDeque<Result<(), SyncFailure>>>>,
    calls: Mutex<Vec<ExecuteRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl MockExecutor {
    /// Executor that succeeds unless scripted otherwise.
    pub fn succeeding() -> Arc<Self> {
        Self::with_default(Ok(()))
    }

    pub fn failing(failure: SyncFailure) -> Arc<Self> {
        Self::with_default(Err(failure))
    }

    fn with_default(default: Result<(), SyncFailure>) -> Arc<Self> {
        Arc::new(MockExecutor {
            default: Mutex::new(default),
            scripted: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        })
    }

    pub fn set_default(&self, outcome: Result<(), SyncFailure>) {
        *self.default.lock().unwrap() = outcome;
    }

    pub fn script(
        &self,
        id: &OperationId,
        outcomes: impl IntoIterator<Item = Result<(), SyncFailure>>,
    ) {
        self.scripted
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_default()
            .extend(outcomes);
    }

    /// Every call sleeps this long before resolving.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<ExecuteRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, id: &OperationId) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| &c.operation_id == id)
            .count()
    }
}

impl RemoteExecutor for MockExecutor {
    fn execute(&self, request: ExecuteRequest) -> ExecuteFuture<'_> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request.clone());
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let scripted = self
                .scripted
                .lock()
                .unwrap()
                .get_mut(&request.operation_id)
                .and_then(|outcomes| outcomes.pop_front());
            scripted.unwrap_or_else(|| self.default.lock().unwrap().clone())
        })
    }
}

/// Memory store whose reads or writes can be switched to fail.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

impl PersistentStore for FailingStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check(&self.fail_reads)?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check(&self.fail_writes)?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.check(&self.fail_writes)?;
        self.inner.remove(key)
    }

    fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check(&self.fail_reads)?;
        self.inner.list_keys(prefix)
    }
}
