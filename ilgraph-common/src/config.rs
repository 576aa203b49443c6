//! Bootstrap configuration for graph front ends
//!
//! Configuration is a single TOML file with two sections:
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [engine]
//! transition_timeout_ms = 3000
//! worker_thread_name = "ilgraph-worker"
//! event_capacity = 100
//! ```
//!
//! # Settings Sources Priority
//!
//! 1. Explicit path passed by the caller
//! 2. Environment variable (`ILGRAPH_CONFIG`)
//! 3. Platform config directory (`<config_dir>/ilgraph/config.toml`)
//! 4. Built-in defaults (code constants)
//!
//! A missing file is not an error: a warning is logged and defaults apply.
//! A file that exists but cannot be read or parsed is an error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "ILGRAPH_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Graph engine configuration (optional)
    #[serde(default)]
    pub engine: EngineSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Graph engine settings
///
/// Every field has a built-in default so a partial `[engine]` table is valid.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EngineSettings {
    /// Upper bound on a batched state-transition wait (milliseconds)
    #[serde(default = "default_transition_timeout_ms")]
    pub transition_timeout_ms: u64,

    /// Name given to each graph's dispatch thread
    #[serde(default = "default_worker_thread_name")]
    pub worker_thread_name: String,

    /// Capacity of the graph event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            transition_timeout_ms: default_transition_timeout_ms(),
            worker_thread_name: default_worker_thread_name(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineSettings {
    /// Transition timeout as Duration
    pub fn transition_timeout(&self) -> Duration {
        Duration::from_millis(self.transition_timeout_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_transition_timeout_ms() -> u64 {
    5000
}

fn default_worker_thread_name() -> String {
    "ilgraph-worker".to_string()
}

fn default_event_capacity() -> usize {
    100
}

impl TomlConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.transition_timeout_ms == 0 {
            return Err(Error::Config(
                "engine.transition_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.engine.event_capacity == 0 {
            return Err(Error::Config(
                "engine.event_capacity must be greater than zero".to_string(),
            ));
        }
        if self.engine.worker_thread_name.trim().is_empty() {
            return Err(Error::Config(
                "engine.worker_thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration following the priority order in the module docs
pub fn load_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .or_else(default_config_path),
    };

    let Some(path) = path else {
        warn!("No configuration directory available, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file {:?} not found, using built-in defaults", path);
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = TomlConfig::from_toml_str(&content)?;
    info!("Loaded configuration from {:?}", path);
    Ok(config)
}

/// Platform default location of the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ilgraph").join("config.toml"))
}
