// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::Session;
use crate::cli::OutputFormat;
use crate::error::{Error, Result};
use crate::output::{format_cache_stats, to_json};

pub fn put(session: &Session, key: &str, value: &str, ttl_ms: Option<u64>) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(value).map_err(|e| Error::InvalidPayload(e.to_string()))?;
    let cache = session.ctx.cache();
    let ttl = ttl_ms.map(Duration::from_millis).unwrap_or_else(|| cache.default_ttl());
    cache.cache(key, &value, ttl)?;
    Ok(())
}

pub fn get(session: &Session, key: &str) -> Result<()> {
    match session.ctx.cache().get::<serde_json::Value>(key)? {
        Some(value) => {
            println!("{}", to_json(&value)?);
            Ok(())
        }
        None => Err(Error::NotCached(key.to_string())),
    }
}

pub fn remove(session: &Session, key: &str) -> Result<()> {
    if !session.ctx.cache().remove(key)? {
        return Err(Error::NotCached(key.to_string()));
    }
    println!("removed {}", key);
    Ok(())
}

pub fn stats(session: &Session, output: OutputFormat) -> Result<()> {
    let stats = session.ctx.cache_stats();
    match output {
        OutputFormat::Text => print!("{}", format_cache_stats(&stats)),
        OutputFormat::Json => println!("{}", to_json(&stats)?),
    }
    Ok(())
}

pub fn sweep(session: &Session) -> Result<()> {
    let removed = session.ctx.cache().clear_expired();
    println!("removed {} expired entries", removed);
    Ok(())
}

pub fn clear(session: &Session) -> Result<()> {
    session.ctx.cache().clear()?;
    println!("cache cleared");
    Ok(())
}
