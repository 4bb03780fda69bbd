//! Configuration for the Warden engine.
//!
//! ```toml
//! [constraints]
//! auto_rollback = true
//! include_defaults = true
//!
//! [protection]
//! default_layers = true
//! short_circuit_priority = 9
//!
//! [reversibility]
//! max_attempts = 3
//! timeout_ms = 30000
//! max_rollback_history = 1000
//!
//! [health]
//! compliance_warning_threshold = 95.0
//! rollback_warning_threshold = 90.0
//! emergency_window_secs = 3600
//! max_diagnostics = 256
//! ```
//!
//! Every field has a default, so an empty file (or no file) is valid.

use std::{fs, io};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// Default value functions for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

const fn default_short_circuit_priority() -> u8 {
    9
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_timeout_ms() -> u64 {
    30_000
}

const fn default_max_rollback_history() -> usize {
    1_000
}

const fn default_compliance_warning_threshold() -> f64 {
    95.0
}

const fn default_rollback_warning_threshold() -> f64 {
    90.0
}

const fn default_emergency_window_secs() -> u64 {
    3_600
}

const fn default_max_diagnostics() -> usize {
    256
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct WardenConfig {
    pub constraints: ConstraintsConfig,
    pub protection: ProtectionConfig,
    pub reversibility: ReversibilityConfig,
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConstraintsConfig {
    /// Flag violations of reversible actions for automatic rollback.
    #[serde(default = "default_true")]
    pub auto_rollback: bool,
    /// Load the built-in deletion/coercion/flattening rules.
    #[serde(default = "default_true")]
    pub include_defaults: bool,
}

impl Default for ConstraintsConfig {
    fn default() -> Self {
        Self {
            auto_rollback: true,
            include_defaults: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProtectionConfig {
    /// Install the existence, anti-optimization and narrative layers.
    #[serde(default = "default_true")]
    pub default_layers: bool,
    /// A denial from a layer at or above this priority skips the remaining
    /// layers for that observer.
    #[serde(default = "default_short_circuit_priority")]
    pub short_circuit_priority: u8,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            default_layers: true,
            short_circuit_priority: default_short_circuit_priority(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReversibilityConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Oldest rollback records are evicted beyond this many.
    #[serde(default = "default_max_rollback_history")]
    pub max_rollback_history: usize,
}

impl ReversibilityConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ReversibilityConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_ms: default_timeout_ms(),
            max_rollback_history: default_max_rollback_history(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HealthConfig {
    /// Compliance rate (percent) below which health degrades to warning.
    #[serde(default = "default_compliance_warning_threshold")]
    pub compliance_warning_threshold: f64,
    /// Rollback success rate (percent) below which health degrades to warning.
    #[serde(default = "default_rollback_warning_threshold")]
    pub rollback_warning_threshold: f64,
    /// How far back `emergency_shutdown` reaches.
    #[serde(default = "default_emergency_window_secs")]
    pub emergency_window_secs: u64,
    /// Bound on retained rollback-failure diagnostics.
    #[serde(default = "default_max_diagnostics")]
    pub max_diagnostics: usize,
}

impl HealthConfig {
    #[must_use]
    pub fn emergency_window(&self) -> Duration {
        Duration::from_secs(self.emergency_window_secs)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            compliance_warning_threshold: default_compliance_warning_threshold(),
            rollback_warning_threshold: default_rollback_warning_threshold(),
            emergency_window_secs: default_emergency_window_secs(),
            max_diagnostics: default_max_diagnostics(),
        }
    }
}

impl WardenConfig {
    /// Load `~/.warden/config.toml`.
    ///
    /// Returns `Ok(None)` when no home directory is known or the file does
    /// not exist.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".warden").join("config.toml"))
}
