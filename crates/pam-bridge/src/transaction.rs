//! State and accessors shared by both sides of a transaction

use crate::backend::{Backend, RawResult};
use crate::error::{Result, ReturnCode, TransactionError};
use crate::ffi::sys;
use crate::status::StatusRegister;
use crate::types::Item;
use std::collections::HashMap;
use std::ffi::CString;

/// Backend plus the status register every native call updates
///
/// Caller-side [`crate::Transaction`] and module-side
/// [`crate::ModuleTransaction`] both dereference to this type.
pub struct TransactionBase<'a> {
    backend: Box<dyn Backend + 'a>,
    status: StatusRegister,
}

impl<'a> TransactionBase<'a> {
    pub(crate) fn new(backend: Box<dyn Backend + 'a>) -> Self {
        Self {
            backend,
            status: StatusRegister::new(),
        }
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Record a native result verbatim and lift it into a [`Result`]
    pub(crate) fn track<T>(&self, result: RawResult<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.status.record(sys::PAM_SUCCESS);
                Ok(value)
            }
            Err(code) => {
                self.status.record(code);
                Err(TransactionError::from_raw(code))
            }
        }
    }

    /// Record the outcome of a composite operation
    pub(crate) fn settle<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.status.record(sys::PAM_SUCCESS),
            Err(e) => self.status.record(e.code().as_raw()),
        }
        result
    }

    pub(crate) fn status_raw(&self) -> i32 {
        self.status.raw()
    }

    /// Code recorded by the most recent native call
    pub fn status(&self) -> ReturnCode {
        self.status.current()
    }

    /// Set a string item
    pub fn set_item(&self, item: Item, value: &str) -> Result<()> {
        let value = self.settle(c_string(value, ReturnCode::BadItem))?;
        self.track(self.backend.set_item(item, &value))
    }

    /// Read a string item; unset items read as the empty string
    pub fn get_item(&self, item: Item) -> Result<String> {
        self.track(self.backend.get_item(item))
            .map(Option::unwrap_or_default)
    }

    /// Set, replace (`NAME=value`), clear (`NAME=`) or delete (`NAME`) an
    /// environment variable of the session
    pub fn put_env(&self, name_value: &str) -> Result<()> {
        let name_value = self.settle(c_string(name_value, ReturnCode::BadItem))?;
        self.track(self.backend.put_env(&name_value))
    }

    /// Value of one session environment variable
    ///
    /// The native call has no status to report, so the register is left
    /// untouched.
    pub fn get_env(&self, name: &str) -> Option<String> {
        let name = CString::new(name).ok()?;
        self.backend.get_env(&name)
    }

    /// The whole session environment
    pub fn get_env_list(&self) -> Result<HashMap<String, String>> {
        let entries = self.track(self.backend.get_env_list())?;
        Ok(parse_env_list(entries))
    }
}

fn c_string(value: &str, code: ReturnCode) -> Result<CString> {
    CString::new(value).map_err(|e| TransactionError::wrap(code, e))
}

/// Split `NAME=value` entries at the first `=`; entries without one are dropped
pub(crate) fn parse_env_list(entries: Vec<String>) -> HashMap<String, String> {
    entries
        .into_iter()
        .filter_map(|entry| {
            entry
                .split_once('=')
                .map(|(name, value)| (name.to_string(), value.to_string()))
        })
        .collect()
}
