//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::config::BridgeConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative configuration file
pub const CONFIG_ENV: &str = "PAM_BRIDGE_CONFIG";

/// System-wide configuration file, optional
pub const DEFAULT_CONFIG_PATH: &str = "/etc/security/pam_bridge.toml";

const LIBRARY_ENV: &str = "PAM_BRIDGE_LIBRARY";
const LOG_ENV: &str = "PAM_BRIDGE_LOG";
const CONFDIR_ENV: &str = "PAM_BRIDGE_CONFDIR";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Configuration file - overrides defaults
/// 3. Environment variables (PAM_BRIDGE_*) - overrides the file
pub struct ConfigLoader {
    /// Explicit configuration file; missing explicit files are an error
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Load from `path` instead of the environment/default location
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load and merge configuration
    pub fn load(&self) -> ConfigResult<BridgeConfig> {
        let config = match self.resolve_path() {
            (path, true) => BridgeConfig::load_from_file(&path)?,
            (path, false) => self.load_optional(&path)?,
        };

        let config = self.apply_env_overrides(config)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the file to read and whether it was explicitly requested
    fn resolve_path(&self) -> (PathBuf, bool) {
        if let Some(path) = &self.config_path {
            return (path.clone(), true);
        }
        match env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => (PathBuf::from(path), true),
            _ => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        }
    }

    fn load_optional(&self, path: &Path) -> ConfigResult<BridgeConfig> {
        match BridgeConfig::load_from_file(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(BridgeConfig::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Empty variables are treated as unset.
    fn apply_env_overrides(&self, mut config: BridgeConfig) -> ConfigResult<BridgeConfig> {
        if let Some(path) = non_empty_var(LIBRARY_ENV) {
            config.library.path = Some(PathBuf::from(path));
        }

        if let Some(filter) = non_empty_var(LOG_ENV) {
            config.logging.filter = Some(filter);
        }

        if let Some(confdir) = non_empty_var(CONFDIR_ENV) {
            config.application.confdir = Some(PathBuf::from(confdir));
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
