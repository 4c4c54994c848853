// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Text and JSON rendering for command output.

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use offsync::CacheStats;
use offsync_core::{
    Disposition, DropReason, HealthReport, OfflineFeatures, OperationError, QueuedOperation,
    SyncProgress, SyncStatus,
};
use serde::Serialize;

use crate::error::Result;

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn format_time(at: Option<DateTime<Utc>>, missing: &str) -> String {
    at.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| missing.to_string())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// JSON shape of `offsync status`.
#[derive(Serialize)]
pub struct StatusReport<'a> {
    #[serde(flatten)]
    pub status: &'a SyncStatus,
    pub features: &'a OfflineFeatures,
}

pub fn format_status(status: &SyncStatus, features: &OfflineFeatures) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "connection: {}", status.connection_status);
    let _ = writeln!(out, "syncing:    {}", yes_no(status.is_syncing));
    let _ = writeln!(out, "pending:    {}", status.pending_count);
    let _ = writeln!(out, "failing:    {}", status.failed_count);
    let _ = writeln!(out, "last sync:  {}", format_time(status.last_sync_at, "never"));
    let _ = writeln!(out, "next retry: {}", format_time(status.next_retry_at, "-"));
    if status.auth_required {
        out.push_str("sync halted: re-authentication required\n");
    }

    let unavailable: Vec<&str> = [
        ("fetch fresh content", features.fetch_fresh_content),
        ("complete purchases", features.complete_purchases),
        ("stream audio", features.stream_audio),
        ("sync account", features.sync_account),
    ]
    .into_iter()
    .filter(|(_, enabled)| !enabled)
    .map(|(name, _)| name)
    .collect();
    if !unavailable.is_empty() {
        let _ = writeln!(out, "unavailable: {}", unavailable.join(", "));
    }
    out
}

pub fn format_health(report: &HealthReport) -> String {
    if report.healthy {
        return "healthy\n".to_string();
    }
    let mut out = String::from("unhealthy\n");
    for issue in &report.issues {
        let _ = writeln!(out, "  - {}", issue);
    }
    out
}

pub fn format_operations(ops: &[QueuedOperation]) -> String {
    if ops.is_empty() {
        return "no queued operations\n".to_string();
    }
    let mut out = String::new();
    for op in ops {
        let _ = write!(
            out,
            "{}  {}  created {}",
            op.id,
            op.kind,
            format_time(Some(op.created_at), "-")
        );
        if op.retry_count > 0 {
            let _ = write!(out, "  retries {}", op.retry_count);
        }
        if let Some(next) = op.next_retry_at {
            let _ = write!(out, "  next {}", format_time(Some(next), "-"));
        }
        out.push('\n');
        if let Some(err) = &op.last_error {
            let _ = writeln!(out, "    last error: {}: {}", err.kind, err.message);
        }
    }
    out
}

pub fn format_cache_stats(stats: &CacheStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "memory entries:   {}", stats.memory_entries);
    let _ = writeln!(out, "memory bytes:     {} / {}", stats.memory_bytes, stats.max_bytes);
    let _ = writeln!(out, "hits:             {}", stats.hits);
    let _ = writeln!(out, "misses:           {}", stats.misses);
    let _ = writeln!(out, "evictions:        {}", stats.evictions);
    let _ = writeln!(out, "expired removed:  {}", stats.expired_removed);
    let _ = writeln!(out, "persist failures: {}", stats.persist_failures);
    out
}

fn drop_reason(reason: DropReason) -> &'static str {
    match reason {
        DropReason::AuthRequired => "dropped, re-authentication required",
        DropReason::Permanent => "dropped, permanent failure",
        DropReason::RetriesExhausted => "dropped, retries exhausted",
    }
}

fn format_operation_error(err: &OperationError) -> String {
    let outcome = match &err.disposition {
        Disposition::Retrying { next_retry_at } => {
            format!("retry at {}", format_time(Some(*next_retry_at), "-"))
        }
        Disposition::Dropped { reason } => drop_reason(*reason).to_string(),
    };
    format!(
        "  {} {}: {}: {} ({})",
        err.operation_id, err.kind, err.failure.kind, err.failure.message, outcome
    )
}

pub fn format_progress(progress: &SyncProgress) -> String {
    let mut out = String::new();
    if progress.skipped_auth {
        let _ = writeln!(
            out,
            "sync halted: re-authentication required ({} pending)",
            progress.pending
        );
        out.push_str("  hint: run `offsync queue resume` after signing in again\n");
        return out;
    }
    let _ = writeln!(
        out,
        "synced {}, failed {}, pending {}",
        progress.succeeded, progress.failed, progress.pending
    );
    for err in &progress.errors {
        let _ = writeln!(out, "{}", format_operation_error(err));
    }
    if progress.requires_reauth() {
        out.push_str("  hint: sign in again, then run `offsync queue resume`\n");
    }
    out
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
