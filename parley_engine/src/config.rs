//! Engine configuration and its TOML loader.
//!
//! A missing or broken configuration file is never fatal: `load_config` logs a warning
//! and falls back to the defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::dialog::MatchMode;
use crate::flags::FlagStore;

/// Tunables shared by every conversation a host runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How keywords are compared with utterances.
    pub match_mode: MatchMode,
    /// Prefix of the host key under which each namespace's packed flags live.
    pub flag_key_prefix: String,
    /// Ask the host to persist flag writes immediately.
    pub persist_immediately: bool,
    /// Item name that stands for "total currency" in item checks and transfers.
    pub currency_item: String,
    pub calendar: Calendar,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::default(),
            flag_key_prefix: "dialog_".to_string(),
            persist_immediately: true,
            currency_item: "money".to_string(),
            calendar: Calendar::default(),
        }
    }
}

impl EngineConfig {
    /// Flag store configured by this engine configuration.
    pub fn flag_store(&self) -> FlagStore {
        FlagStore::new(self.flag_key_prefix.clone(), self.persist_immediately)
    }

    /// # Errors
    /// - if the text is not valid TOML for an `EngineConfig`
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing engine configuration")
    }
}

/// Load the engine configuration from `toml_path`, or defaults if that fails.
pub fn load_config(toml_path: &Path) -> EngineConfig {
    match try_load_config(toml_path) {
        Ok(config) => {
            info!(
                "engine configuration loaded from '{}' ({:?} matching)",
                toml_path.display(),
                config.match_mode
            );
            config
        },
        Err(e) => {
            warn!(
                "Could not load engine configuration from '{}': {:#}. Using defaults.",
                toml_path.display(),
                e
            );
            EngineConfig::default()
        },
    }
}

/// Attempts to load the engine configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn try_load_config(toml_path: &Path) -> Result<EngineConfig> {
    let text = fs::read_to_string(toml_path)
        .with_context(|| format!("reading engine configuration from '{}'", toml_path.display()))?;
    EngineConfig::from_toml_str(&text)
}
