// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const QUICKSTART_HELP: &str = "\
Get started:
  offsync enqueue save-note '{\"id\": 1}'   Queue a remote write
  offsync status                            Show connectivity and backlog
  offsync sync                              Push queued writes to the remote
  offsync cache put profile '{\"n\": 1}'     Cache a value with the default ttl";

#[derive(Parser)]
#[command(name = "offsync")]
#[command(version)]
#[command(about = "Offline sync engine: durable write queue, two-tier cache, sync status")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Directory holding offsync.db and config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub state_dir: Option<PathBuf>,

    /// Config file [default: <state-dir>/config.toml]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Treat the network as unavailable
    #[arg(long, global = true)]
    pub offline: bool,

    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show connectivity, backlog, and feature availability
    Status {
        /// Output format
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Check engine health (exits non-zero when issues are found)
    Health {
        /// Output format
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Queue a remote write
    #[command(after_help = "Examples:\n  \
        offsync enqueue save-note '{\"id\": 7, \"body\": \"hi\"}'\n  \
        offsync enqueue update_profile '{\"name\": \"sam\"}'")]
    Enqueue {
        /// Operation kind (save_note, delete_note, save_bookmark, delete_bookmark,
        /// update_preferences, update_profile, record_progress)
        kind: String,

        /// JSON payload
        payload: String,
    },

    /// Inspect and manage queued operations
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Drain the queue against the remote now
    Sync {
        /// Give up after this many milliseconds
        #[arg(long, value_name = "MS", default_value_t = 30_000)]
        timeout_ms: u64,
    },

    /// Read and manage cached values
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// List queued operations, oldest first
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Remove an operation without executing it
    Remove {
        /// Operation ID
        id: String,
    },

    /// Attempt one operation now
    Retry {
        /// Operation ID
        id: String,
    },

    /// Clear the re-authentication block after signing in again
    Resume,
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Store a JSON value
    Put {
        /// Cache key
        key: String,

        /// JSON value
        value: String,

        /// Time to live [default: cache.default_ttl_ms]
        #[arg(long, value_name = "MS")]
        ttl_ms: Option<u64>,
    },

    /// Print a cached value (fails when missing or expired)
    Get {
        /// Cache key
        key: String,
    },

    /// Remove a cached value
    Remove {
        /// Cache key
        key: String,
    },

    /// Show cache statistics
    Stats {
        /// Output format
        #[arg(long, short, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Delete expired entries
    Sweep,

    /// Delete every cached entry
    Clear,
}
