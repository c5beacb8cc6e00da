//! pam-bridge configuration
//!
//! Locates the native PAM library and tunes diagnostics for both
//! applications and modules built on `pam-bridge`.
//!
//! # Configuration Hierarchy
//!
//! Configuration is merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Configuration file (`$PAM_BRIDGE_CONFIG`, else `/etc/security/pam_bridge.toml`)
//! 3. Environment variables (`PAM_BRIDGE_*`)
//!
//! # Example
//!
//! ```no_run
//! use pam_bridge_config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load().unwrap();
//! println!("{:?}", config.library_path());
//! ```

pub mod config;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

pub use config::{ApplicationConfig, BridgeConfig, LibraryConfig, LoggingConfig};
pub use loader::{ConfigLoader, CONFIG_ENV, DEFAULT_CONFIG_PATH};
