//! Module side: the transaction handed to service modules
//!
//! A module is a shared object exporting the six `pam_sm_*` entry points.
//! [`crate::pam_module!`] generates them; each one builds a
//! [`ModuleTransaction`] around the framework's handle and runs the
//! registered [`ModuleHandler`] through [`ModuleTransaction::invoke_handler`].

mod data;
mod dispatch;
mod invoker;
#[doc(hidden)]
pub mod macros;

pub use dispatch::{dispatch, ModuleEvent, ModuleHandler};
pub use invoker::HandlerFn;

use crate::backend::{Backend, NativeSession};
use crate::error::{Result, ReturnCode, TransactionError};
use crate::ffi::{sys, PamLibrary};
use crate::transaction::TransactionBase;
use std::ffi::CString;
use std::ops::Deref;

/// Transaction as seen from inside a module
///
/// The framework owns the session; dropping this value never ends it.
pub struct ModuleTransaction<'a> {
    base: TransactionBase<'a>,
}

impl<'a> ModuleTransaction<'a> {
    /// Wrap any backend, e.g. [`crate::testing::MockBackend`]
    pub fn new(backend: impl Backend + 'a) -> Self {
        Self {
            base: TransactionBase::new(Box::new(backend)),
        }
    }

    /// Get the user name, prompting through the conversation if it is not
    /// known yet. `None` uses the framework's default prompt.
    pub fn get_user(&self, prompt: Option<&str>) -> Result<String> {
        let prompt = prompt
            .map(CString::new)
            .transpose()
            .map_err(|e| TransactionError::wrap(ReturnCode::BadItem, e));
        let prompt = self.settle(prompt)?;
        self.track(self.backend().get_user(prompt.as_deref()))
    }
}

impl ModuleTransaction<'static> {
    /// Wrap the handle passed to a `pam_sm_*` entry point
    ///
    /// # Safety
    ///
    /// `pamh` must be the live handle of the current invocation, and the
    /// transaction must not outlive it.
    pub unsafe fn from_native(lib: &'static PamLibrary, pamh: *mut sys::pam_handle_t) -> Self {
        Self::new(NativeSession::from_raw(lib, pamh))
    }
}

impl<'a> Deref for ModuleTransaction<'a> {
    type Target = TransactionBase<'a>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
