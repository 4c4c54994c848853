// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    invalid_ttl = { Error::InvalidTtl, "ttl" },
    not_found = { Error::OperationNotFound("op-123".into()), "op-123" },
    config = { Error::Config("bad table".into()), "bad table" },
    store = { Error::Store(StoreError::Unavailable("disk gone".into())), "disk gone" },
    not_stored = {
        Error::EntryNotStored {
            key: "feed".into(),
            size: 900,
            source: StoreError::Unavailable("disk full".into()),
        },
        "disk full",
    },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn core_errors_are_transparent() {
    let err: Error = offsync_core::Error::InvalidOperationKind("zap".into()).into();
    assert!(err.to_string().starts_with("invalid operation kind"));
}
