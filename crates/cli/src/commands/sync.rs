// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tracing::info;

use super::Session;
use crate::error::{Error, Result};
use crate::output::format_progress;

/// Drains the queue once and reports what happened.
///
/// Offline this is a no-op that reports the backlog.
pub async fn sync(session: &Session, timeout_ms: u64) -> Result<()> {
    if session.offline {
        let status = session.ctx.status();
        println!("offline: {} operation(s) pending", status.pending_count);
        return Ok(());
    }
    session.require_remote()?;

    let progress =
        tokio::time::timeout(Duration::from_millis(timeout_ms), session.ctx.trigger_sync())
            .await
            .map_err(|_| Error::Timeout(timeout_ms))?;
    info!(
        succeeded = progress.succeeded,
        failed = progress.failed,
        pending = progress.pending,
        "sync finished"
    );
    print!("{}", format_progress(&progress));
    Ok(())
}
