// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::Session;
use crate::cli::OutputFormat;
use crate::error::{Error, Result};
use crate::output::{format_health, format_status, to_json, StatusReport};

pub fn status(session: &Session, output: OutputFormat) -> Result<()> {
    let status = session.ctx.status();
    let features = session.ctx.features();
    match output {
        OutputFormat::Text => print!("{}", format_status(&status, &features)),
        OutputFormat::Json => {
            println!("{}", to_json(&StatusReport { status: &status, features: &features })?)
        }
    }
    Ok(())
}

/// Prints the health report; an unhealthy engine is an error so the exit
/// code reflects it.
pub fn health(session: &Session, output: OutputFormat) -> Result<()> {
    let report = session.ctx.check_health();
    match output {
        OutputFormat::Text => print!("{}", format_health(&report)),
        OutputFormat::Json => println!("{}", to_json(&report)?),
    }
    if report.healthy {
        Ok(())
    } else {
        Err(Error::Unhealthy(report.issues.len()))
    }
}
