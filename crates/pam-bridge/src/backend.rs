//! The seam between transactions and the native framework
//!
//! [`Backend`] is the set of per-session primitives both sides of a
//! transaction build on. [`NativeSession`] forwards to libpam; the in-memory
//! [`crate::testing::MockBackend`] lets handlers be exercised without it.
//! Results carry the raw native status so the transaction layer can record
//! it verbatim.

use crate::ffi::marshal::{string_from_ptr, NativeStringList};
use crate::ffi::{sys, PamLibrary};
use crate::handle::Handle;
use crate::types::{Flags, Item};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Native result: the value, or the non-success status
pub type RawResult<T> = std::result::Result<T, c_int>;

pub(crate) fn check(status: c_int) -> RawResult<()> {
    if status == sys::PAM_SUCCESS {
        Ok(())
    } else {
        Err(status)
    }
}

/// Per-session primitives shared by caller-side and module-side transactions
pub trait Backend {
    fn set_item(&self, item: Item, value: &CStr) -> RawResult<()>;

    /// `None` when the item is unset
    fn get_item(&self, item: Item) -> RawResult<Option<String>>;

    /// The conversation registered on the session, if any
    fn conversation(&self) -> RawResult<Option<sys::pam_conv>>;

    /// `pam_get_user`; may itself run a conversation
    fn get_user(&self, prompt: Option<&CStr>) -> RawResult<String>;

    /// Install `token` under `key` with [`release_data`] as cleanup hook.
    /// Any token previously installed under `key` is released by the
    /// framework before this returns. Zero installs "nothing".
    fn set_data(&self, key: &CStr, token: usize) -> RawResult<()>;

    /// Token installed under `key`, zero when none
    fn get_data(&self, key: &CStr) -> RawResult<usize>;

    fn put_env(&self, name_value: &CStr) -> RawResult<()>;

    fn get_env(&self, name: &CStr) -> Option<String>;

    /// Raw `NAME=value` entries
    fn get_env_list(&self) -> RawResult<Vec<String>>;
}

impl<T: Backend + ?Sized> Backend for &T {
    fn set_item(&self, item: Item, value: &CStr) -> RawResult<()> {
        (**self).set_item(item, value)
    }
    fn get_item(&self, item: Item) -> RawResult<Option<String>> {
        (**self).get_item(item)
    }
    fn conversation(&self) -> RawResult<Option<sys::pam_conv>> {
        (**self).conversation()
    }
    fn get_user(&self, prompt: Option<&CStr>) -> RawResult<String> {
        (**self).get_user(prompt)
    }
    fn set_data(&self, key: &CStr, token: usize) -> RawResult<()> {
        (**self).set_data(key, token)
    }
    fn get_data(&self, key: &CStr) -> RawResult<usize> {
        (**self).get_data(key)
    }
    fn put_env(&self, name_value: &CStr) -> RawResult<()> {
        (**self).put_env(name_value)
    }
    fn get_env(&self, name: &CStr) -> Option<String> {
        (**self).get_env(name)
    }
    fn get_env_list(&self) -> RawResult<Vec<String>> {
        (**self).get_env_list()
    }
}

/// Cleanup hook registered with every `pam_set_data` call
///
/// Releases exactly the handle it is given, whatever the reason
/// (`PAM_DATA_REPLACE`, `PAM_DATA_SILENT` or plain teardown).
pub unsafe extern "C" fn release_data(
    _pamh: *mut sys::pam_handle_t,
    data: *mut c_void,
    _error_status: c_int,
) {
    if let Some(handle) = Handle::from_raw(data as usize) {
        // A panicking destructor must not unwind into libpam.
        let _ = panic::catch_unwind(AssertUnwindSafe(|| handle.release()));
    }
}

/// A live `pam_handle_t` plus the library that owns it
#[derive(Clone, Copy)]
pub struct NativeSession {
    lib: &'static PamLibrary,
    pamh: *mut sys::pam_handle_t,
}

impl NativeSession {
    /// # Safety
    ///
    /// `pamh` must be a live handle created by `lib` and must outlive every
    /// use of the returned session.
    pub unsafe fn from_raw(lib: &'static PamLibrary, pamh: *mut sys::pam_handle_t) -> Self {
        Self { lib, pamh }
    }

    pub fn library(&self) -> &'static PamLibrary {
        self.lib
    }

    pub fn as_ptr(&self) -> *mut sys::pam_handle_t {
        self.pamh
    }

    fn flags_call(&self, f: sys::PamFlagsFn, flags: Flags) -> RawResult<()> {
        // Safety: pamh is live for the session's lifetime.
        check(unsafe { f(self.pamh, flags.as_raw()) })
    }

    pub fn authenticate(&self, flags: Flags) -> RawResult<()> {
        self.flags_call(self.lib.authenticate, flags)
    }

    pub fn set_cred(&self, flags: Flags) -> RawResult<()> {
        self.flags_call(self.lib.setcred, flags)
    }

    pub fn acct_mgmt(&self, flags: Flags) -> RawResult<()> {
        self.flags_call(self.lib.acct_mgmt, flags)
    }

    pub fn chauthtok(&self, flags: Flags) -> RawResult<()> {
        self.flags_call(self.lib.chauthtok, flags)
    }

    pub fn open_session(&self, flags: Flags) -> RawResult<()> {
        self.flags_call(self.lib.open_session, flags)
    }

    pub fn close_session(&self, flags: Flags) -> RawResult<()> {
        self.flags_call(self.lib.close_session, flags)
    }

    /// `pam_end`; the session must not be used afterwards
    pub(crate) fn end(&self, status: c_int) -> c_int {
        // Safety: called once by the owning transaction.
        unsafe { (self.lib.end)(self.pamh, status) }
    }

    fn raw_item(&self, item: c_int) -> RawResult<*const c_void> {
        let mut value: *const c_void = ptr::null();
        // Safety: pamh is live, value is a valid out-pointer.
        check(unsafe { (self.lib.get_item)(self.pamh, item, &mut value) })?;
        Ok(value)
    }
}

impl Backend for NativeSession {
    fn set_item(&self, item: Item, value: &CStr) -> RawResult<()> {
        // Safety: libpam copies string items.
        check(unsafe {
            (self.lib.set_item)(self.pamh, item.as_raw(), value.as_ptr() as *const c_void)
        })
    }

    fn get_item(&self, item: Item) -> RawResult<Option<String>> {
        let value = self.raw_item(item.as_raw())?;
        // Safety: string items are NUL-terminated and owned by libpam.
        Ok(unsafe { string_from_ptr(value as *const c_char) })
    }

    fn conversation(&self) -> RawResult<Option<sys::pam_conv>> {
        let value = self.raw_item(sys::PAM_CONV)?;
        if value.is_null() {
            return Ok(None);
        }
        // Safety: PAM_CONV points at the session's struct pam_conv.
        Ok(Some(unsafe { *(value as *const sys::pam_conv) }))
    }

    fn get_user(&self, prompt: Option<&CStr>) -> RawResult<String> {
        let mut user: *const c_char = ptr::null();
        let prompt = prompt.map_or(ptr::null(), CStr::as_ptr);
        // Safety: out-pointer is valid; the returned string is owned by libpam.
        check(unsafe { (self.lib.get_user)(self.pamh, &mut user, prompt) })?;
        Ok(unsafe { string_from_ptr(user) }.unwrap_or_default())
    }

    fn set_data(&self, key: &CStr, token: usize) -> RawResult<()> {
        // Safety: libpam copies the key; the token is an opaque integer.
        check(unsafe {
            (self.lib.set_data)(
                self.pamh,
                key.as_ptr(),
                token as *mut c_void,
                Some(release_data),
            )
        })
    }

    fn get_data(&self, key: &CStr) -> RawResult<usize> {
        let mut data: *const c_void = ptr::null();
        // Safety: out-pointer is valid.
        check(unsafe { (self.lib.get_data)(self.pamh, key.as_ptr(), &mut data) })?;
        Ok(data as usize)
    }

    fn put_env(&self, name_value: &CStr) -> RawResult<()> {
        // Safety: libpam copies the entry.
        check(unsafe { (self.lib.putenv)(self.pamh, name_value.as_ptr()) })
    }

    fn get_env(&self, name: &CStr) -> Option<String> {
        // Safety: the returned value is owned by libpam and copied at once.
        unsafe { string_from_ptr((self.lib.getenv)(self.pamh, name.as_ptr())) }
    }

    fn get_env_list(&self) -> RawResult<Vec<String>> {
        // Safety: pam_getenvlist hands us ownership of the array.
        let list = unsafe { NativeStringList::from_raw((self.lib.getenvlist)(self.pamh)) };
        if list.is_null() {
            return Err(sys::PAM_BUF_ERR);
        }
        Ok(list.to_vec())
    }
}
