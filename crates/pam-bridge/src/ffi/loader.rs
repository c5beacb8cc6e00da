//! Runtime loading of the native PAM library
//!
//! PAM entry points are resolved with `libloading` instead of being linked,
//! so the crate builds and its tests run on hosts without PAM development
//! files, and optional entry points (`pam_start_confdir`) can be probed the
//! same way a weak symbol would be.
//!
//! Inside a module the library is already mapped by the host process;
//! opening it again only bumps its reference count.
//!
//! Only Linux-PAM is supported: return codes and flag values in
//! [`crate::ffi::sys`] are Linux-PAM's, and OpenPAM numbers them
//! differently. Other platforms fail with [`LoadError::Unsupported`].

use crate::error::{ReturnCode, TransactionError};
use crate::ffi::sys;
use libloading::Library;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Library loading errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// None of the candidate names could be opened
    #[error("PAM library not found (tried {tried})")]
    LibraryNotFound { tried: String },
    /// A mandatory entry point is missing
    #[error("Symbol '{symbol}' not found in '{library}'")]
    SymbolNotFound { library: String, symbol: String },
    /// The platform's PAM is not Linux-PAM
    #[error("PAM on {platform} is not supported, only Linux-PAM is")]
    Unsupported { platform: &'static str },
}

impl From<LoadError> for TransactionError {
    fn from(e: LoadError) -> Self {
        let code = match e {
            LoadError::LibraryNotFound { .. } | LoadError::Unsupported { .. } => {
                ReturnCode::OpenErr
            }
            LoadError::SymbolNotFound { .. } => ReturnCode::SymbolErr,
        };
        TransactionError::wrap(code, e)
    }
}

/// Resolved PAM entry points
///
/// Function pointers stay valid for as long as the owning [`Library`] is
/// loaded; the process-wide instance from [`PamLibrary::global`] is never
/// unloaded.
pub struct PamLibrary {
    name: String,
    pub(crate) start: sys::PamStartFn,
    pub(crate) start_confdir: Option<sys::PamStartConfdirFn>,
    pub(crate) end: sys::PamEndFn,
    pub(crate) authenticate: sys::PamFlagsFn,
    pub(crate) setcred: sys::PamFlagsFn,
    pub(crate) acct_mgmt: sys::PamFlagsFn,
    pub(crate) chauthtok: sys::PamFlagsFn,
    pub(crate) open_session: sys::PamFlagsFn,
    pub(crate) close_session: sys::PamFlagsFn,
    pub(crate) set_item: sys::PamSetItemFn,
    pub(crate) get_item: sys::PamGetItemFn,
    pub(crate) putenv: sys::PamPutenvFn,
    pub(crate) getenv: sys::PamGetenvFn,
    pub(crate) getenvlist: sys::PamGetenvlistFn,
    pub(crate) get_user: sys::PamGetUserFn,
    pub(crate) set_data: sys::PamSetDataFn,
    pub(crate) get_data: sys::PamGetDataFn,
    _library: Library,
}

static GLOBAL: OnceCell<Result<PamLibrary, LoadError>> = OnceCell::new();

impl PamLibrary {
    /// Linux-PAM sonames, tried in order: the runtime soname, then the
    /// development symlink
    pub fn default_candidates() -> Vec<PathBuf> {
        ["libpam.so.0", "libpam.so"]
            .iter()
            .map(PathBuf::from)
            .collect()
    }

    /// Process-wide library, loaded on first use from the configured path
    /// or the platform defaults. A failed load is remembered.
    pub fn global() -> Result<&'static PamLibrary, LoadError> {
        GLOBAL
            .get_or_init(|| {
                let configured = pam_bridge_config::ConfigLoader::new()
                    .load()
                    .map_err(|e| tracing::warn!("ignoring pam-bridge configuration: {e}"))
                    .ok()
                    .and_then(|config| config.library.path);
                let candidates = match configured {
                    Some(path) => vec![path],
                    None => Self::default_candidates(),
                };
                Self::load_first(&candidates)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Open the first candidate that loads and resolve every entry point
    pub fn load_first(candidates: &[PathBuf]) -> Result<PamLibrary, LoadError> {
        for candidate in candidates {
            match Self::load(candidate) {
                Ok(library) => return Ok(library),
                Err(LoadError::LibraryNotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(LoadError::LibraryNotFound {
            tried: candidates
                .iter()
                .map(|c| c.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Open one library by path or soname
    pub fn load(path: &Path) -> Result<PamLibrary, LoadError> {
        if !cfg!(target_os = "linux") {
            return Err(LoadError::Unsupported {
                platform: std::env::consts::OS,
            });
        }
        let name = path.display().to_string();
        // Safety: loading libpam runs its initialisers, which have no
        // preconditions beyond a sane process.
        let library = unsafe { Library::new(path) }
            .map_err(|_| LoadError::LibraryNotFound { tried: name.clone() })?;

        tracing::debug!(library = %name, "loaded PAM library");

        // Safety: every type below matches the prototype in <security/pam_appl.h>
        // or <security/pam_modules.h>.
        unsafe {
            Ok(PamLibrary {
                start: resolve(&library, &name, "pam_start")?,
                start_confdir: resolve(&library, &name, "pam_start_confdir").ok(),
                end: resolve(&library, &name, "pam_end")?,
                authenticate: resolve(&library, &name, "pam_authenticate")?,
                setcred: resolve(&library, &name, "pam_setcred")?,
                acct_mgmt: resolve(&library, &name, "pam_acct_mgmt")?,
                chauthtok: resolve(&library, &name, "pam_chauthtok")?,
                open_session: resolve(&library, &name, "pam_open_session")?,
                close_session: resolve(&library, &name, "pam_close_session")?,
                set_item: resolve(&library, &name, "pam_set_item")?,
                get_item: resolve(&library, &name, "pam_get_item")?,
                putenv: resolve(&library, &name, "pam_putenv")?,
                getenv: resolve(&library, &name, "pam_getenv")?,
                getenvlist: resolve(&library, &name, "pam_getenvlist")?,
                get_user: resolve(&library, &name, "pam_get_user")?,
                set_data: resolve(&library, &name, "pam_set_data")?,
                get_data: resolve(&library, &name, "pam_get_data")?,
                name,
                _library: library,
            })
        }
    }

    /// Library name as it was opened
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `pam_start_confdir` is available
    pub fn has_start_confdir(&self) -> bool {
        self.start_confdir.is_some()
    }
}

/// Copy a function pointer out of the library
///
/// # Safety
///
/// `T` must be the exact function pointer type of `symbol`, and the returned
/// pointer must not outlive `library`.
unsafe fn resolve<T: Copy>(library: &Library, name: &str, symbol: &str) -> Result<T, LoadError> {
    library
        .get::<T>(symbol.as_bytes())
        .map(|sym| *sym)
        .map_err(|_| LoadError::SymbolNotFound {
            library: name.to_string(),
            symbol: symbol.to_string(),
        })
}
