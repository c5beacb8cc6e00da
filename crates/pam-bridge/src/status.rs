//! Last native status of a transaction

use crate::error::ReturnCode;
use crate::ffi::sys;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicI32, Ordering};

/// Atomically updated record of the most recent native return code
///
/// Last writer wins. When several threads drive one transaction this only
/// tells you what happened *somewhere*; rely on each call's own result.
#[derive(Debug)]
pub struct StatusRegister(AtomicI32);

impl StatusRegister {
    pub fn new() -> Self {
        Self(AtomicI32::new(sys::PAM_SUCCESS))
    }

    pub fn record(&self, code: c_int) {
        self.0.store(code, Ordering::SeqCst);
    }

    /// Raw value, possibly outside the known enumeration
    pub fn raw(&self) -> c_int {
        self.0.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> ReturnCode {
        ReturnCode::classify(self.raw())
    }
}

impl Default for StatusRegister {
    fn default() -> Self {
        Self::new()
    }
}
