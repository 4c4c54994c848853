// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn manual_clock_is_frozen_until_advanced() {
    let clock = ManualClock::at_epoch();
    assert_eq!(clock.now(), DateTime::<Utc>::UNIX_EPOCH);
    assert_eq!(clock.now(), clock.now());

    clock.advance(Duration::from_millis(1500));
    assert_eq!(clock.now().timestamp_millis(), 1500);
}

#[test]
fn manual_clock_set_overrides_current_time() {
    let clock = ManualClock::at_epoch();
    let target = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
    clock.set(target);
    assert_eq!(clock.now(), target);
}

#[test]
fn shared_clock_reads_through_arc() {
    let clock = Arc::new(ManualClock::at_epoch());
    let shared: Arc<dyn ClockSource> = clock.clone();
    clock.advance(Duration::from_secs(2));
    assert_eq!(shared.now().timestamp(), 2);
}

#[test]
fn add_duration_saturates_instead_of_overflowing() {
    let far = add_duration(DateTime::<Utc>::MAX_UTC, Duration::from_secs(60));
    assert_eq!(far, DateTime::<Utc>::MAX_UTC);
}

#[test]
fn until_is_zero_for_past_deadlines() {
    let now = DateTime::<Utc>::from_timestamp(100, 0).unwrap();
    let past = DateTime::<Utc>::from_timestamp(50, 0).unwrap();
    let future = DateTime::<Utc>::from_timestamp(103, 0).unwrap();
    assert_eq!(until(now, past), Duration::ZERO);
    assert_eq!(until(now, future), Duration::from_secs(3));
}

#[test]
fn system_clock_is_close_to_chrono_now() {
    let before = Utc::now();
    let now = SystemClock.now();
    assert!(now >= before);
}
