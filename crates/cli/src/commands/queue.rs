// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use offsync_core::{OperationId, OperationKind};

use super::Session;
use crate::cli::OutputFormat;
use crate::error::{Error, Result};
use crate::output::{format_operations, to_json};

pub fn enqueue(session: &Session, kind: &str, payload: &str) -> Result<()> {
    let kind: OperationKind = kind.parse()?;
    let payload: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| Error::InvalidPayload(e.to_string()))?;
    let id = session.ctx.enqueue(kind, payload)?;
    println!("{}", id);
    Ok(())
}

pub fn list(session: &Session, output: OutputFormat) -> Result<()> {
    let ops = session.ctx.queued_operations()?;
    match output {
        OutputFormat::Text => print!("{}", format_operations(&ops)),
        OutputFormat::Json => println!("{}", to_json(&ops)?),
    }
    Ok(())
}

pub fn remove(session: &Session, id: &str) -> Result<()> {
    let id = OperationId::new(id);
    if !session.ctx.remove_operation(&id)? {
        return Err(offsync::Error::OperationNotFound(id.to_string()).into());
    }
    println!("removed {}", id);
    Ok(())
}

pub async fn retry(session: &Session, id: &str) -> Result<()> {
    let id = OperationId::new(id);
    if session.offline {
        println!("offline: {} left queued", id);
        return Ok(());
    }
    session.require_remote()?;

    if session.ctx.retry_operation(&id).await? {
        println!("synced {}", id);
        return Ok(());
    }
    if session.ctx.status().auth_required {
        println!("sync halted: re-authentication required");
        println!("  hint: run `offsync queue resume` after signing in again");
        return Ok(());
    }
    let ops = session.ctx.queued_operations()?;
    match ops.iter().find(|op| op.id == id) {
        Some(op) => {
            println!("not synced: {}", id);
            if let Some(err) = &op.last_error {
                println!("  last error: {}: {}", err.kind, err.message);
            }
        }
        None => println!("dropped {}", id),
    }
    Ok(())
}

pub fn resume(session: &Session) -> Result<()> {
    let was_blocked = session.ctx.status().auth_required;
    session.ctx.resume_after_reauth();
    if was_blocked {
        println!("sync resumed");
    } else {
        println!("sync was not halted");
    }
    Ok(())
}
