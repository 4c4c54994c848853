// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! offsync-cli - command-line front end for the offline sync engine.
//!
//! Each invocation opens the SQLite-backed engine in the state directory,
//! performs one command in the foreground, and exits. Queued operations,
//! retry schedules, the auth block, and persisted cache entries survive
//! between invocations.
//!
//! ```text
//! offsync enqueue save-note '{"id": 7}'
//! offsync queue list
//! offsync sync
//! ```

mod cli;
mod commands;
mod logging;
mod output;

pub mod config;
pub mod env;
pub mod error;

pub use cli::{CacheCommand, Cli, Command, OutputFormat, QueueCommand};
pub use config::{Config, RemoteConfig};
pub use error::{Error, Result};

/// Runs one parsed command line to completion.
pub fn run(cli: Cli) -> Result<()> {
    logging::setup_logging(cli.verbose);

    let (config, state_dir) = config::load_settings(cli.config, cli.state_dir)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::run(cli.command, &config, &state_dir, cli.offline))
}
