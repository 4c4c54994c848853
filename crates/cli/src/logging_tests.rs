// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    default = { false, None, "warn" },
    from_env = { false, Some("offsync=trace"), "offsync=trace" },
    verbose_wins = { true, Some("offsync=trace"), "debug" },
    malformed_env = { false, Some("offsync=loudest"), "warn" },
)]
fn filter_selection(verbose: bool, directive: Option<&str>, expected: &str) {
    assert_eq!(build_filter(verbose, directive).to_string(), expected);
}

#[test]
fn setup_is_repeatable() {
    setup_logging(false);
    setup_logging(true);
}
