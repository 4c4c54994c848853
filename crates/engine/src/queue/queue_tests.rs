// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::store::MemoryStore;
use crate::test_helpers::{t0, FailingStore, MockExecutor};
use offsync_core::ManualClock;
use serde_json::json;
use std::time::Duration;

struct Fixture {
    store: Arc<MemoryStore>,
    executor: Arc<MockExecutor>,
    clock: Arc<ManualClock>,
    queue: OperationQueue,
}

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(60),
    }
}

fn fixture() -> Fixture {
    fixture_with(policy(5))
}

fn fixture_with(policy: RetryPolicy) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let executor = MockExecutor::succeeding();
    let clock = Arc::new(ManualClock::new(t0()));
    let queue = OperationQueue::open(store.clone(), executor.clone(), clock.clone(), policy).unwrap();
    Fixture { store, executor, clock, queue }
}

impl Fixture {
    /// Enqueues one note save per label, a millisecond apart so order is stable.
    fn enqueue_notes(&self, labels: &[&str]) -> Vec<OperationId> {
        labels
            .iter()
            .map(|label| {
                self.clock.advance(Duration::from_millis(1));
                self.queue
                    .enqueue(OperationKind::SaveNote, json!({ "note": label }))
                    .unwrap()
            })
            .collect()
    }

    fn reopen(&self) -> OperationQueue {
        OperationQueue::open(
            self.store.clone(),
            self.executor.clone(),
            self.clock.clone(),
            self.queue.policy(),
        )
        .unwrap()
    }

    fn op(&self, id: &OperationId) -> QueuedOperation {
        self.queue
            .get_queued_operations()
            .unwrap()
            .into_iter()
            .find(|op| &op.id == id)
            .unwrap()
    }
}

#[test]
fn enqueue_persists_without_attempting() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a", "b", "c"]);

    let ops = f.queue.get_queued_operations().unwrap();
    assert_eq!(ops.iter().map(|op| op.id.clone()).collect::<Vec<_>>(), ids);
    assert!(ops.iter().all(|op| op.retry_count == 0 && op.last_error.is_none()));
    assert_eq!(f.store.list_keys(QUEUE_PREFIX).unwrap().len(), 3);
    assert_eq!(f.executor.call_count(), 0);
}

#[test]
fn enqueue_fails_when_store_rejects_write() {
    let store = FailingStore::new();
    store.fail_writes(true);
    let queue = OperationQueue::open(
        store.clone(),
        MockExecutor::succeeding(),
        Arc::new(ManualClock::new(t0())),
        policy(5),
    )
    .unwrap();

    let err = queue.enqueue(OperationKind::SaveBookmark, json!({})).unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    store.fail_writes(false);
    assert!(queue.get_queued_operations().unwrap().is_empty());
}

#[tokio::test]
async fn drain_executes_in_creation_order_and_clears_queue() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a", "b", "c"]);

    let progress = f.queue.process_queue().await;

    assert_eq!(progress.succeeded, 3);
    assert_eq!(progress.failed, 0);
    assert_eq!(progress.pending, 0);
    let executed: Vec<_> = f.executor.calls().into_iter().map(|c| c.operation_id).collect();
    assert_eq!(executed, ids);
    assert!(f.queue.get_queued_operations().unwrap().is_empty());
    assert_eq!(f.queue.last_sync_at(), Some(f.clock.now()));
    assert!(f.store.get(META_LAST_SYNC).unwrap().is_some());
}

#[tokio::test]
async fn requests_carry_stable_idempotency_key() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a"]);
    f.executor.script(&ids[0], [Err(SyncFailure::network("timeout"))]);

    f.queue.process_queue().await;
    f.clock.advance(Duration::from_secs(5));
    f.queue.process_queue().await;

    let calls = f.executor.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].idempotency_key, ids[0].idempotency_key());
    assert_eq!(calls[0].idempotency_key, calls[1].idempotency_key);
}

#[tokio::test]
async fn network_failure_schedules_retry() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a"]);
    f.executor.set_default(Err(SyncFailure::network("socket closed")));
    let failed_at = f.clock.now();

    let progress = f.queue.process_queue().await;

    assert_eq!(progress.failed, 1);
    assert_eq!(progress.pending, 1);
    let expected_retry = failed_at + chrono::Duration::seconds(1);
    assert_eq!(
        progress.errors[0].disposition,
        Disposition::Retrying { next_retry_at: expected_retry }
    );

    let op = f.op(&ids[0]);
    assert_eq!(op.retry_count, 1);
    assert_eq!(op.next_retry_at, Some(expected_retry));
    let last_error = op.last_error.unwrap();
    assert_eq!(last_error.kind, FailureKind::Network);
    assert_eq!(last_error.message, "socket closed");
    assert!(f.queue.scheduler().is_scheduled(&ids[0]));
}

#[tokio::test]
async fn backing_off_operation_is_skipped_until_due() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a"]);
    f.executor.script(&ids[0], [Err(SyncFailure::network("down"))]);

    f.queue.process_queue().await;
    let again = f.queue.process_queue().await;
    assert_eq!(again.attempted(), 0);
    assert_eq!(again.pending, 1);
    assert_eq!(f.executor.call_count(), 1);

    f.clock.advance(Duration::from_secs(1));
    let due = f.queue.process_queue().await;
    assert_eq!(due.succeeded, 1);
    assert_eq!(due.pending, 0);
}

#[tokio::test]
async fn data_failure_drops_operation() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a", "b"]);
    f.executor.script(&ids[0], [Err(SyncFailure::data("invalid argument"))]);

    let progress = f.queue.process_queue().await;

    assert_eq!(progress.succeeded, 1);
    assert_eq!(progress.failed, 1);
    assert_eq!(progress.pending, 0);
    assert_eq!(
        progress.errors[0].disposition,
        Disposition::Dropped { reason: DropReason::Permanent }
    );
    assert!(!f.queue.auth_required());
}

#[tokio::test]
async fn executor_can_mark_retriable_kind_permanent() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a"]);
    f.executor.script(&ids[0], [Err(SyncFailure::network("gone").permanent())]);

    let progress = f.queue.process_queue().await;

    assert!(progress.errors[0].is_dropped());
    assert_eq!(progress.pending, 0);
}

#[tokio::test]
async fn auth_failure_drops_operation_and_halts_sync() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a", "b", "c"]);
    f.executor.script(&ids[1], [Err(SyncFailure::auth("token expired"))]);

    let progress = f.queue.process_queue().await;

    assert_eq!(progress.succeeded, 1);
    assert_eq!(progress.failed, 1);
    assert_eq!(progress.pending, 1);
    assert!(progress.requires_reauth());
    assert_eq!(
        progress.errors[0].disposition,
        Disposition::Dropped { reason: DropReason::AuthRequired }
    );
    assert_eq!(f.executor.calls_for(&ids[2]), 0);
    assert_eq!(f.op(&ids[2]).retry_count, 0);
    assert!(f.queue.auth_required());
    assert!(f.store.get(META_AUTH_REQUIRED).unwrap().is_some());

    let blocked = f.queue.process_queue().await;
    assert!(blocked.skipped_auth);
    assert_eq!(blocked.attempted(), 0);
    assert_eq!(blocked.pending, 1);
    assert!(!f.queue.retry_operation(&ids[2]).await.unwrap());
    assert_eq!(f.executor.call_count(), 2);

    f.queue.resume_after_reauth();
    assert!(!f.queue.auth_required());
    assert!(f.store.get(META_AUTH_REQUIRED).unwrap().is_none());
    let resumed = f.queue.process_queue().await;
    assert_eq!(resumed.succeeded, 1);
    assert_eq!(resumed.pending, 0);
}

#[tokio::test]
async fn auth_drop_ignores_prior_retry_count() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a"]);
    f.executor.script(
        &ids[0],
        [Err(SyncFailure::network("down")), Err(SyncFailure::auth("revoked"))],
    );

    f.queue.process_queue().await;
    assert_eq!(f.op(&ids[0]).retry_count, 1);
    f.clock.advance(Duration::from_secs(10));
    let progress = f.queue.process_queue().await;

    assert_eq!(progress.pending, 0);
    assert_eq!(f.executor.calls_for(&ids[0]), 2);
}

#[tokio::test]
async fn retries_exhausted_after_max_attempts() {
    let f = fixture_with(policy(3));
    let ids = f.enqueue_notes(&["a"]);
    f.executor.set_default(Err(SyncFailure::network("down")));

    let mut last = SyncProgress::default();
    for _ in 0..5 {
        last = f.queue.process_queue().await;
        f.clock.advance(Duration::from_secs(60));
    }

    assert_eq!(f.executor.calls_for(&ids[0]), 3);
    assert!(f.queue.get_queued_operations().unwrap().is_empty());
    assert_eq!(last.attempted(), 0);
    assert!(!f.queue.scheduler().is_scheduled(&ids[0]));
}

#[tokio::test]
async fn final_attempt_reports_retries_exhausted() {
    let f = fixture_with(policy(1));
    f.enqueue_notes(&["a"]);
    f.executor.set_default(Err(SyncFailure::quota("resource exhausted")));

    let progress = f.queue.process_queue().await;

    assert_eq!(
        progress.errors[0].disposition,
        Disposition::Dropped { reason: DropReason::RetriesExhausted }
    );
}

#[tokio::test]
async fn quota_failure_waits_max_delay() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a"]);
    f.executor.script(&ids[0], [Err(SyncFailure::quota("slow down"))]);
    let failed_at = f.clock.now();

    f.queue.process_queue().await;

    assert_eq!(
        f.op(&ids[0]).next_retry_at,
        Some(failed_at + chrono::Duration::seconds(60))
    );
}

#[tokio::test]
async fn retry_operation_outcomes() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a"]);

    let missing = f.queue.retry_operation(&OperationId::from("op-missing")).await;
    assert!(matches!(missing, Err(Error::OperationNotFound(id)) if id == "op-missing"));

    f.executor.script(&ids[0], [Err(SyncFailure::unknown("weird"))]);
    assert!(!f.queue.retry_operation(&ids[0]).await.unwrap());
    assert_eq!(f.op(&ids[0]).retry_count, 1);

    // Still backing off: no attempt, no change
    assert!(!f.queue.retry_operation(&ids[0]).await.unwrap());
    assert_eq!(f.executor.call_count(), 1);
    assert_eq!(f.op(&ids[0]).retry_count, 1);

    f.clock.advance(Duration::from_secs(2));
    assert!(f.queue.retry_operation(&ids[0]).await.unwrap());
    assert!(f.queue.get_queued_operations().unwrap().is_empty());
    assert!(f.queue.last_sync_at().is_some());
}

#[tokio::test]
async fn remove_from_queue_cancels_retry_timer() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a", "b"]);
    f.executor.script(&ids[0], [Err(SyncFailure::network("down"))]);
    f.executor.script(&ids[1], [Err(SyncFailure::network("down"))]);
    f.queue.process_queue().await;
    assert_eq!(f.queue.scheduler().len(), 2);

    assert!(f.queue.remove_from_queue(&ids[0]).unwrap());
    assert!(!f.queue.remove_from_queue(&ids[0]).unwrap());

    assert!(!f.queue.scheduler().is_scheduled(&ids[0]));
    assert!(f.queue.scheduler().is_scheduled(&ids[1]));
    let remaining: Vec<_> = f.queue.get_queued_operations().unwrap().into_iter().map(|op| op.id).collect();
    assert_eq!(remaining, vec![ids[1].clone()]);
}

#[tokio::test]
async fn snapshot_reports_failed_and_next_retry() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a", "b", "c"]);
    f.executor.script(&ids[0], [Err(SyncFailure::unknown("?"))]);
    f.executor.script(&ids[1], [Err(SyncFailure::network("down"))]);

    let before = f.queue.snapshot().unwrap();
    assert_eq!(before.pending, 3);
    assert_eq!(before.failed, 0);
    assert_eq!(before.next_retry_at, None);
    assert_eq!(before.last_sync_at, None);

    let drained_at = f.clock.now();
    f.queue.process_queue().await;

    let after = f.queue.snapshot().unwrap();
    assert_eq!(after.pending, 2);
    assert_eq!(after.failed, 2);
    // Network backs off 1s, unknown 2s
    assert_eq!(after.next_retry_at, Some(drained_at + chrono::Duration::seconds(1)));
    assert_eq!(after.last_sync_at, Some(drained_at));
    assert!(!after.is_draining);
}

#[tokio::test]
async fn reopen_restores_auth_block_last_sync_and_timers() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a", "b", "c"]);
    f.executor.script(&ids[0], [Err(SyncFailure::network("down"))]);
    f.executor.script(&ids[1], [Ok(())]);
    f.executor.script(&ids[2], [Err(SyncFailure::auth("expired"))]);
    f.queue.process_queue().await;
    let synced_at = f.queue.last_sync_at();

    let reopened = f.reopen();

    assert!(reopened.auth_required());
    assert_eq!(reopened.last_sync_at(), synced_at);
    assert!(reopened.scheduler().is_scheduled(&ids[0]));
    assert_eq!(reopened.get_queued_operations().unwrap().len(), 1);
}

#[tokio::test]
async fn corrupt_records_are_skipped() {
    let f = fixture();
    f.enqueue_notes(&["a"]);
    f.store.set("queue:op-garbage", "{not json").unwrap();

    assert_eq!(f.queue.get_queued_operations().unwrap().len(), 1);
    let progress = f.queue.process_queue().await;
    assert_eq!(progress.succeeded, 1);
    assert_eq!(progress.pending, 0);
}

#[tokio::test]
async fn events_follow_queue_lifecycle() {
    let f = fixture();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let _sub = f.queue.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    let ids = f.enqueue_notes(&["a", "b"]);
    f.executor.script(&ids[1], [Err(SyncFailure::auth("expired"))]);
    f.queue.process_queue().await;
    f.queue.resume_after_reauth();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            QueueEvent::Enqueued(ids[0].clone()),
            QueueEvent::Enqueued(ids[1].clone()),
            QueueEvent::DrainStarted,
            QueueEvent::Removed(ids[0].clone()),
            QueueEvent::Removed(ids[1].clone()),
            QueueEvent::AuthRequired,
            QueueEvent::DrainFinished,
            QueueEvent::AuthCleared,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_drains_attempt_each_operation_once() {
    let f = fixture();
    f.enqueue_notes(&["a", "b", "c"]);
    // Each call stays in flight long enough for the second drain to start
    f.executor.set_delay(Duration::from_millis(10));

    let (first, second) = tokio::join!(f.queue.process_queue(), f.queue.process_queue());

    assert_eq!(first.succeeded + second.succeeded, 3);
    assert_eq!(f.executor.call_count(), 3);
    assert!(!f.queue.is_draining());
}

#[tokio::test(start_paused = true)]
async fn drain_started_mid_flight_waits_for_the_running_one() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a", "b"]);
    f.executor.set_delay(Duration::from_millis(10));

    let second = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(f.queue.is_draining());
        f.queue.process_queue().await
    };
    let (first, second) = tokio::join!(f.queue.process_queue(), second);

    assert_eq!(first.succeeded, 2);
    assert_eq!(second.attempted(), 0);
    for id in &ids {
        assert_eq!(f.executor.calls_for(id), 1);
    }
}

#[tokio::test]
async fn missing_retry_timer_is_rearmed_by_drain() {
    let f = fixture();
    let ids = f.enqueue_notes(&["a"]);
    f.executor.set_default(Err(SyncFailure::network("down")));
    f.queue.process_queue().await;

    // Timer consumed while the wall clock still says the retry is not due
    assert!(f.queue.scheduler().cancel(&ids[0]));
    let progress = f.queue.process_queue().await;

    assert_eq!(progress.attempted(), 0);
    assert!(f.queue.scheduler().is_scheduled(&ids[0]));
}

#[tokio::test]
async fn unwritten_retry_state_keeps_backoff_and_is_written_later() {
    let store = FailingStore::new();
    let executor = MockExecutor::failing(SyncFailure::network("down"));
    let clock = Arc::new(ManualClock::new(t0()));
    let queue = OperationQueue::open(store.clone(), executor.clone(), clock.clone(), policy(5))
        .unwrap();
    let id = queue.enqueue(OperationKind::SaveNote, json!({ "note": "a" })).unwrap();

    store.fail_writes(true);
    let first = queue.process_queue().await;
    assert!(matches!(first.errors[0].disposition, Disposition::Retrying { .. }));

    // Still backing off even though the store holds the old record
    let again = queue.process_queue().await;
    assert_eq!(again.attempted(), 0);
    assert_eq!(executor.call_count(), 1);
    assert_eq!(queue.get_queued_operations().unwrap()[0].retry_count, 1);

    store.fail_writes(false);
    queue.process_queue().await;
    let stored = QueuedOperation::from_json(&store.get(&record_key(&id)).unwrap().unwrap()).unwrap();
    assert_eq!(stored.retry_count, 1);
    assert!(stored.next_retry_at.is_some());
}

#[tokio::test]
async fn store_read_failure_aborts_drain() {
    let store = FailingStore::new();
    let executor = MockExecutor::succeeding();
    let queue = OperationQueue::open(
        store.clone(),
        executor.clone(),
        Arc::new(ManualClock::new(t0())),
        policy(5),
    )
    .unwrap();
    queue.enqueue(OperationKind::DeleteNote, json!({ "id": 1 })).unwrap();
    store.fail_reads(true);

    let progress = queue.process_queue().await;

    assert_eq!(progress.attempted(), 0);
    assert_eq!(executor.call_count(), 0);
    assert!(queue.snapshot().is_err());
}
