// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration for workhub.
//!
//! Read from `~/.workhub/config.json`. Every field has a default, so a
//! missing file or a partial file is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::security::credential::ExpiryPolicy;

/// Directory under the home directory holding config and session data.
pub const DATA_DIR_NAME: &str = ".workhub";
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where the session store lives. Defaults to `~/.workhub`.
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    /// Reject credentials that carry no `exp` claim (default: false)
    #[serde(default)]
    pub strict_expiry: bool,
    /// Log level for the CLI: "error", "warn", "info", "debug" or "trace"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: None,
            strict_expiry: false,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy::from_strict(self.strict_expiry)
    }

    /// The configured store directory, or the default data directory.
    pub fn resolved_store_dir(&self) -> Result<PathBuf> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(default_data_dir()?),
        }
    }
}

/// `~/.workhub`
pub fn default_data_dir() -> Result<PathBuf, StoreError> {
    let home = dirs::home_dir().ok_or_else(|| {
        StoreError::Io(io::Error::new(io::ErrorKind::NotFound, "could not find home directory"))
    })?;
    Ok(home.join(DATA_DIR_NAME))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join(CONFIG_FILE_NAME))
}

/// Load config from `path`, falling back to defaults if it does not exist.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&default_config_path()?)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}
