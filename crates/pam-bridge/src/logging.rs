//! Diagnostic output
//!
//! Modules run inside someone else's process, so the subscriber is
//! installed lazily on first entry, writes to stderr, and never replaces a
//! subscriber the host already installed.

use once_cell::sync::OnceCell;
use pam_bridge_config::{ConfigLoader, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive
pub const LOG_ENV: &str = "PAM_BRIDGE_LOG";

const DEFAULT_FILTER: &str = "warn";

static INIT: OnceCell<()> = OnceCell::new();

/// Install the stderr subscriber once per process
///
/// The filter comes from [`LOG_ENV`], else `config.filter`, else `warn`.
pub fn init(config: &LoggingConfig) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER)))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // A host-installed global subscriber wins.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(config.ansi.unwrap_or(false))
            .try_init();
    });
}

/// [`init`] with the logging section of the on-disk configuration
///
/// An unreadable configuration falls back to the default filter and is
/// reported through the subscriber it just installed.
pub fn init_from_config() {
    if is_initialized() {
        return;
    }
    match ConfigLoader::new().load() {
        Ok(config) => init(&config.logging),
        Err(e) => {
            init(&LoggingConfig::default());
            tracing::warn!("ignoring pam-bridge configuration: {e}");
        }
    }
}

/// Whether [`init`] already ran in this process
pub fn is_initialized() -> bool {
    INIT.get().is_some()
}
