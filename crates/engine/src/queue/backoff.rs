// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Retry policy.

use std::time::Duration;

use offsync_core::FailureKind;

/// How long to wait before retrying, and how many attempts to allow.
///
/// Delays grow exponentially with the retry count and are capped at
/// `max_delay`. The exponent depends on the failure kind:
/// - network: `base * 2^(n-1)`
/// - unknown: `base * 2^n`, one step more conservative than network
/// - quota: always `max_delay`
///
/// where `n` is the retry count after the failed attempt (1 on first failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Whether an operation that has already failed `retry_count` times gets another attempt.
    pub fn allows_retry(&self, retry_count: u32) -> bool {
        retry_count.saturating_add(1) < self.max_retries
    }

    /// Backoff before attempt `retry_count + 1`.
    pub fn delay_for(&self, kind: FailureKind, retry_count: u32) -> Duration {
        let exponent = match kind {
            FailureKind::Network => retry_count.saturating_sub(1),
            FailureKind::Unknown => retry_count,
            FailureKind::Quota => return self.max_delay,
            // Fatal kinds are never rescheduled
            FailureKind::Auth | FailureKind::Data => return Duration::ZERO,
        };
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
