//! Configuration file model
//!
//! ```toml
//! [library]
//! path = "/usr/lib/x86_64-linux-gnu/libpam.so.0"
//!
//! [logging]
//! filter = "pam_bridge=debug"
//! ansi = false
//!
//! [application]
//! confdir = "/srv/pam.d"
//! ```

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root of `pam_bridge.toml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Native library location
    #[serde(default)]
    pub library: LibraryConfig,

    /// Diagnostics
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Caller-side defaults
    #[serde(default)]
    pub application: ApplicationConfig,
}

/// Where to find the native PAM library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Explicit library path or soname. When unset the platform defaults
    /// (`libpam.so.0`, `libpam.so`, ...) are tried in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Diagnostic output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive, e.g. `"warn,pam_bridge=debug"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Colourise output (default: false, modules usually log to a tty owned by someone else)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ansi: Option<bool>,
}

/// Defaults applied when an application starts a transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ApplicationConfig {
    /// Service configuration directory handed to `pam_start_confdir`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confdir: Option<PathBuf>,
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration text; `origin` is only used for error reporting
    pub fn parse(content: &str, origin: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: origin.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that can never work
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(path) = &self.library.path {
            validate_non_empty_path("library.path", path)?;
        }
        if let Some(confdir) = &self.application.confdir {
            validate_non_empty_path("application.confdir", confdir)?;
        }
        if let Some(filter) = &self.logging.filter {
            if filter.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "logging.filter".to_string(),
                    reason: "filter must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Configured library path, if any
    pub fn library_path(&self) -> Option<&Path> {
        self.library.path.as_deref()
    }

    /// Configured service directory, if any
    pub fn confdir(&self) -> Option<&Path> {
        self.application.confdir.as_deref()
    }

    /// Effective log filter (default: `warn`)
    pub fn log_filter(&self) -> &str {
        self.logging.filter.as_deref().unwrap_or("warn")
    }
}

fn validate_non_empty_path(field: &str, path: &Path) -> ConfigResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "path must not be empty".to_string(),
        });
    }
    Ok(())
}
