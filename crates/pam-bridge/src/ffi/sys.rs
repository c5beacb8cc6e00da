//! Raw C declarations for the PAM boundary
//!
//! Layouts and constants follow `<security/_pam_types.h>` from Linux-PAM.
//! Nothing here is resolved at link time: PAM entry points are looked up at
//! runtime by [`crate::ffi::loader`], only the C allocator is linked directly.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_void};

/// Opaque `pam_handle_t`
#[repr(C)]
pub struct pam_handle_t {
    _private: [u8; 0],
}

/// `struct pam_message`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct pam_message {
    pub msg_style: c_int,
    pub msg: *const c_char,
}

/// `struct pam_response`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct pam_response {
    pub resp: *mut c_char,
    pub resp_retcode: c_int,
}

/// Conversation callback as registered in `struct pam_conv`
pub type ConvFn = unsafe extern "C" fn(
    num_msg: c_int,
    msg: *mut *const pam_message,
    resp: *mut *mut pam_response,
    appdata_ptr: *mut c_void,
) -> c_int;

/// `struct pam_conv`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct pam_conv {
    pub conv: Option<ConvFn>,
    pub appdata_ptr: *mut c_void,
}

/// Cleanup hook passed to `pam_set_data`
pub type DataCleanupFn =
    unsafe extern "C" fn(pamh: *mut pam_handle_t, data: *mut c_void, error_status: c_int);

// Return codes
pub const PAM_SUCCESS: c_int = 0;
pub const PAM_OPEN_ERR: c_int = 1;
pub const PAM_SYMBOL_ERR: c_int = 2;
pub const PAM_SERVICE_ERR: c_int = 3;
pub const PAM_SYSTEM_ERR: c_int = 4;
pub const PAM_BUF_ERR: c_int = 5;
pub const PAM_PERM_DENIED: c_int = 6;
pub const PAM_AUTH_ERR: c_int = 7;
pub const PAM_CRED_INSUFFICIENT: c_int = 8;
pub const PAM_AUTHINFO_UNAVAIL: c_int = 9;
pub const PAM_USER_UNKNOWN: c_int = 10;
pub const PAM_MAXTRIES: c_int = 11;
pub const PAM_NEW_AUTHTOK_REQD: c_int = 12;
pub const PAM_ACCT_EXPIRED: c_int = 13;
pub const PAM_SESSION_ERR: c_int = 14;
pub const PAM_CRED_UNAVAIL: c_int = 15;
pub const PAM_CRED_EXPIRED: c_int = 16;
pub const PAM_CRED_ERR: c_int = 17;
pub const PAM_NO_MODULE_DATA: c_int = 18;
pub const PAM_CONV_ERR: c_int = 19;
pub const PAM_AUTHTOK_ERR: c_int = 20;
pub const PAM_AUTHTOK_RECOVERY_ERR: c_int = 21;
pub const PAM_AUTHTOK_LOCK_BUSY: c_int = 22;
pub const PAM_AUTHTOK_DISABLE_AGING: c_int = 23;
pub const PAM_TRY_AGAIN: c_int = 24;
pub const PAM_IGNORE: c_int = 25;
pub const PAM_ABORT: c_int = 26;
pub const PAM_AUTHTOK_EXPIRED: c_int = 27;
pub const PAM_MODULE_UNKNOWN: c_int = 28;
pub const PAM_BAD_ITEM: c_int = 29;
pub const PAM_CONV_AGAIN: c_int = 30;
pub const PAM_INCOMPLETE: c_int = 31;

// Items
pub const PAM_SERVICE: c_int = 1;
pub const PAM_USER: c_int = 2;
pub const PAM_TTY: c_int = 3;
pub const PAM_RHOST: c_int = 4;
pub const PAM_CONV: c_int = 5;
pub const PAM_AUTHTOK: c_int = 6;
pub const PAM_OLDAUTHTOK: c_int = 7;
pub const PAM_RUSER: c_int = 8;
pub const PAM_USER_PROMPT: c_int = 9;

// Flags
pub const PAM_SILENT: c_int = 0x8000;
pub const PAM_DISALLOW_NULL_AUTHTOK: c_int = 0x0001;
pub const PAM_ESTABLISH_CRED: c_int = 0x0002;
pub const PAM_DELETE_CRED: c_int = 0x0004;
pub const PAM_REINITIALIZE_CRED: c_int = 0x0008;
pub const PAM_REFRESH_CRED: c_int = 0x0010;
pub const PAM_CHANGE_EXPIRED_AUTHTOK: c_int = 0x0020;

// Message styles
pub const PAM_PROMPT_ECHO_OFF: c_int = 1;
pub const PAM_PROMPT_ECHO_ON: c_int = 2;
pub const PAM_ERROR_MSG: c_int = 3;
pub const PAM_TEXT_INFO: c_int = 4;
/// Linux-PAM extension; OpenPAM and Solaris have no binary prompts.
pub const PAM_BINARY_PROMPT: c_int = 7;

/// Upper bound on messages in one conversation call
pub const PAM_MAX_NUM_MSG: usize = 32;

// Reasons passed to data cleanup hooks
pub const PAM_DATA_SILENT: c_int = 0x4000_0000;
pub const PAM_DATA_REPLACE: c_int = 0x2000_0000;

/// libpamc's ceiling for one binary prompt, header included
pub const PAM_BP_MAX_LENGTH: usize = 0x0200_0000;

// The native side frees what we hand it with free(3) and hands us buffers
// we must free(3) ourselves, so the C allocator is used directly.
extern "C" {
    pub fn malloc(size: usize) -> *mut c_void;
    pub fn calloc(nmemb: usize, size: usize) -> *mut c_void;
    pub fn free(ptr: *mut c_void);
}

// Entry point signatures, resolved by the loader.
pub type PamStartFn = unsafe extern "C" fn(
    service_name: *const c_char,
    user: *const c_char,
    pam_conversation: *const pam_conv,
    pamh: *mut *mut pam_handle_t,
) -> c_int;
pub type PamStartConfdirFn = unsafe extern "C" fn(
    service_name: *const c_char,
    user: *const c_char,
    pam_conversation: *const pam_conv,
    confdir: *const c_char,
    pamh: *mut *mut pam_handle_t,
) -> c_int;
pub type PamEndFn = unsafe extern "C" fn(pamh: *mut pam_handle_t, pam_status: c_int) -> c_int;
pub type PamFlagsFn = unsafe extern "C" fn(pamh: *mut pam_handle_t, flags: c_int) -> c_int;
pub type PamSetItemFn =
    unsafe extern "C" fn(pamh: *mut pam_handle_t, item_type: c_int, item: *const c_void) -> c_int;
pub type PamGetItemFn = unsafe extern "C" fn(
    pamh: *const pam_handle_t,
    item_type: c_int,
    item: *mut *const c_void,
) -> c_int;
pub type PamPutenvFn = unsafe extern "C" fn(pamh: *mut pam_handle_t, name_value: *const c_char) -> c_int;
pub type PamGetenvFn =
    unsafe extern "C" fn(pamh: *mut pam_handle_t, name: *const c_char) -> *const c_char;
pub type PamGetenvlistFn = unsafe extern "C" fn(pamh: *mut pam_handle_t) -> *mut *mut c_char;
pub type PamGetUserFn = unsafe extern "C" fn(
    pamh: *mut pam_handle_t,
    user: *mut *const c_char,
    prompt: *const c_char,
) -> c_int;
pub type PamSetDataFn = unsafe extern "C" fn(
    pamh: *mut pam_handle_t,
    module_data_name: *const c_char,
    data: *mut c_void,
    cleanup: Option<DataCleanupFn>,
) -> c_int;
pub type PamGetDataFn = unsafe extern "C" fn(
    pamh: *const pam_handle_t,
    module_data_name: *const c_char,
    data: *mut *const c_void,
) -> c_int;
