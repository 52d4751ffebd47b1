//! Pool configuration types

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PoolError, Result};
use crate::types::Identity;

/// Complete pool configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Only identity allowed to initialize pools; any identity when unset
    #[serde(default)]
    pub program_authority: Option<Identity>,

    /// Events kept per pool (0 disables the journal)
    #[serde(default = "default_journal_capacity")]
    pub journal_capacity: usize,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_journal_capacity() -> usize {
    1024
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            program_authority: None,
            journal_capacity: default_journal_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PoolError::Config(e.to_string()))
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PoolError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
