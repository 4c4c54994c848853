// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! CLI configuration.
//!
//! Configuration is read from `--config`, `OFFSYNC_CONFIG`, or
//! `<state dir>/config.toml`, in that order. The engine tables (`[cache]`,
//! `[queue]`, `[health]`, `[coordinator]`) sit alongside the CLI's own keys:
//!
//! ```toml
//! state_dir = "/var/lib/offsync"
//!
//! [remote]
//! url = "wss://sync.example.com/ws"
//!
//! [queue]
//! max_retries = 5
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use offsync::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{Error, Result};

const APP_DIR_NAME: &str = "offsync";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "offsync.db";

/// Configuration for the `offsync` CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where the database lives when neither `--state-dir` nor
    /// `OFFSYNC_STATE_DIR` is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    /// Remote sync endpoint (optional - without it the CLI cannot sync).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

/// WebSocket remote settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// `ws://...` or `wss://...`
    pub url: String,
    /// How long to wait for the result of one operation (default: 10s).
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

fn default_response_timeout_ms() -> u64 {
    10_000
}

impl RemoteConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Returns an error message if the URL is not a WebSocket URL.
    pub fn validate_url(&self) -> Option<String> {
        if self.url.starts_with("ws://") || self.url.starts_with("wss://") {
            return None;
        }
        Some(format!(
            "invalid remote URL '{}': must be ws:// or wss://",
            self.url
        ))
    }
}

impl Config {
    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        if let Some(msg) = config.remote.as_ref().and_then(RemoteConfig::validate_url) {
            return Err(Error::Config(msg));
        }
        config.engine.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file that must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Loads configuration from `path`, or defaults when the file is absent.
    pub fn load_optional(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.remote.as_ref().map(|r| r.url.as_str())
    }
}

/// Picks the state directory from explicit sources, highest precedence first.
pub fn resolve_state_dir(
    flag: Option<PathBuf>,
    env_dir: Option<PathBuf>,
    config: &Config,
) -> Option<PathBuf> {
    flag.or(env_dir).or_else(|| config.state_dir.clone())
}

/// `$XDG_STATE_HOME/offsync`, falling back to `~/.local/state/offsync`.
pub fn default_state_dir() -> Option<PathBuf> {
    env::xdg_state_home()
        .map(|dir| dir.join(APP_DIR_NAME))
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/state").join(APP_DIR_NAME)))
}

/// Loads the configuration and resolves the state directory for this run.
///
/// The config file is looked up before `state_dir` from the config is known,
/// so the default config location ignores the config's own `state_dir` key.
pub fn load_settings(
    config_flag: Option<PathBuf>,
    state_dir_flag: Option<PathBuf>,
) -> Result<(Config, PathBuf)> {
    let config = match config_flag.or_else(env::config_path) {
        Some(path) => Config::load(&path)?,
        None => match state_dir_flag
            .clone()
            .or_else(env::state_dir)
            .or_else(default_state_dir)
        {
            Some(dir) => Config::load_optional(&dir.join(CONFIG_FILE_NAME))?,
            None => Config::default(),
        },
    };
    let state_dir = resolve_state_dir(state_dir_flag, env::state_dir(), &config)
        .or_else(default_state_dir)
        .ok_or(Error::NoStateDir)?;
    Ok((config, state_dir))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
