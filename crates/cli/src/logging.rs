// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostic logging to stderr.
//!
//! Filtering follows `OFFSYNC_LOG` (an `EnvFilter` directive such as
//! `offsync=debug`). `--verbose` overrides it with `debug`.

use tracing_subscriber::EnvFilter;

use crate::env::vars;

const DEFAULT_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "debug";

pub fn setup_logging(verbose: bool) {
    let filter = build_filter(verbose, std::env::var(vars::OFFSYNC_LOG).ok().as_deref());

    // Ignore the error if a subscriber is already installed (tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_filter(verbose: bool, directive: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new(VERBOSE_FILTER);
    }
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
