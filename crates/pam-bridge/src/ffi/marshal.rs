//! Buffer ownership at the native boundary
//!
//! Every buffer that crosses into or out of PAM is held by a guard from this
//! module and released on `Drop`, so each exit path (native failure,
//! protocol violation, panic unwinding) frees it exactly once:
//!
//! - [`MessageArray`]: request prompts, alive for one conversation call
//! - [`NativeResponses`]: `calloc`ed response arrays, whichever side allocated them
//! - [`NativeStringList`]: `pam_getenvlist` results
//!
//! Text responses can carry secrets, so they are zeroed before `free`.

use crate::ffi::sys;
use crate::types::Style;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

/// Copy `s` into a `malloc`ed, NUL-terminated buffer owned by the caller
///
/// Returns `None` when `s` contains an interior NUL (it could not be
/// represented without truncation) or allocation fails.
pub fn dup_c_string(s: &str) -> Option<*mut c_char> {
    if s.as_bytes().contains(&0) {
        return None;
    }
    let len = s.len();
    // Safety: the buffer is len + 1 bytes and fully written below.
    unsafe {
        let buf = sys::malloc(len + 1) as *mut u8;
        if buf.is_null() {
            return None;
        }
        ptr::copy_nonoverlapping(s.as_ptr(), buf, len);
        *buf.add(len) = 0;
        Some(buf as *mut c_char)
    }
}

/// Copy `bytes` into a `malloc`ed buffer owned by the caller
pub fn dup_bytes(bytes: &[u8]) -> Option<*mut u8> {
    // Safety: the buffer is exactly bytes.len() bytes (at least one).
    unsafe {
        let buf = sys::malloc(bytes.len().max(1)) as *mut u8;
        if buf.is_null() {
            return None;
        }
        ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len());
        Some(buf)
    }
}

/// Overwrite a NUL-terminated buffer with zeros and free it
///
/// # Safety
///
/// `ptr` must be null or a `malloc`ed, NUL-terminated string not used afterwards.
pub unsafe fn zero_and_free_c_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    let len = CStr::from_ptr(ptr).to_bytes().len();
    ptr::write_bytes(ptr, 0, len);
    sys::free(ptr as *mut c_void);
}

/// Copy a possibly-null C string into an owned `String`
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
pub unsafe fn string_from_ptr(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// Module arguments as owned strings
///
/// # Safety
///
/// `argv` must be null or point to `argc` valid C strings.
pub unsafe fn args_from_argv(argc: c_int, argv: *const *const c_char) -> Vec<String> {
    if argv.is_null() || argc <= 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(argv, argc as usize)
        .iter()
        .filter_map(|&arg| string_from_ptr(arg))
        .collect()
}

/// Payload kept alive behind one `pam_message`
enum Prompt {
    Text(CString),
    Binary(Vec<u8>),
}

/// Request side of one conversation round trip
///
/// Owns the prompt storage, the contiguous `pam_message` array and the
/// pointer array handed to the conversation function. Works with both the
/// Linux-PAM (`msg[i]`) and Solaris (`(*msg)[i]`) indexing conventions.
pub struct MessageArray {
    _prompts: Vec<Prompt>,
    messages: Vec<sys::pam_message>,
    pointers: Vec<*const sys::pam_message>,
}

/// Builder for [`MessageArray`]
#[derive(Default)]
pub struct MessageArrayBuilder {
    prompts: Vec<Prompt>,
    styles: Vec<c_int>,
}

impl MessageArrayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text prompt; fails on an interior NUL
    pub fn text(&mut self, style: Style, prompt: &str) -> Result<(), std::ffi::NulError> {
        self.prompts.push(Prompt::Text(CString::new(prompt)?));
        self.styles.push(style.as_raw());
        Ok(())
    }

    /// Add an already framed binary prompt
    pub fn binary(&mut self, framed: Vec<u8>) {
        self.prompts.push(Prompt::Binary(framed));
        self.styles.push(Style::BinaryPrompt.as_raw());
    }

    pub fn build(self) -> MessageArray {
        let messages: Vec<sys::pam_message> = self
            .prompts
            .iter()
            .zip(&self.styles)
            .map(|(prompt, &msg_style)| sys::pam_message {
                msg_style,
                msg: match prompt {
                    Prompt::Text(text) => text.as_ptr(),
                    Prompt::Binary(bytes) => bytes.as_ptr() as *const c_char,
                },
            })
            .collect();
        // Heap storage of `messages` never moves once built, so these stay valid.
        let pointers = messages.iter().map(|m| m as *const _).collect();
        MessageArray {
            _prompts: self.prompts,
            messages,
            pointers,
        }
    }
}

impl MessageArray {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `const struct pam_message **` for the conversation function
    pub fn as_native(&mut self) -> *mut *const sys::pam_message {
        self.pointers.as_mut_ptr()
    }
}

/// How a response slot must be released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// NUL-terminated text, zeroed before release
    Text,
    /// Framed binary data, released as-is
    Binary,
}

/// A `calloc`ed `pam_response` array and the buffers it points to
pub struct NativeResponses {
    ptr: *mut sys::pam_response,
    kinds: Vec<ResponseKind>,
}

impl NativeResponses {
    /// Allocate a zeroed array of `kinds.len()` responses
    pub fn allocate(kinds: Vec<ResponseKind>) -> Option<Self> {
        // Safety: calloc with a non-zero count, checked for null.
        let ptr = unsafe { sys::calloc(kinds.len().max(1), std::mem::size_of::<sys::pam_response>()) }
            as *mut sys::pam_response;
        if ptr.is_null() {
            return None;
        }
        Some(Self { ptr, kinds })
    }

    /// Take ownership of an array returned by a conversation function
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a `malloc`-family array of at least `kinds.len()`
    /// responses whose non-null `resp` fields are `malloc`ed buffers.
    pub unsafe fn from_raw(ptr: *mut sys::pam_response, kinds: Vec<ResponseKind>) -> Self {
        Self { ptr, kinds }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    pub fn len(&self) -> usize {
        if self.ptr.is_null() {
            0
        } else {
            self.kinds.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw `resp` pointer of slot `index`, null when absent
    pub fn get(&self, index: usize) -> *const c_char {
        if index >= self.len() {
            return ptr::null();
        }
        // Safety: index is within the allocated array.
        unsafe { (*self.ptr.add(index)).resp }
    }

    /// Install a `malloc`ed buffer in slot `index`; ownership moves to the array
    pub fn set(&mut self, index: usize, resp: *mut c_char) {
        if index >= self.len() {
            return;
        }
        // Safety: index is within the allocated array.
        unsafe {
            let slot = &mut *self.ptr.add(index);
            slot.resp = resp;
            slot.resp_retcode = 0;
        }
    }

    /// Hand the array to native code, which becomes responsible for freeing it
    pub fn into_raw(self) -> *mut sys::pam_response {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for NativeResponses {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        // Safety: ptr owns kinds.len() slots allocated with the C allocator.
        unsafe {
            for (index, kind) in self.kinds.iter().enumerate() {
                let resp = (*self.ptr.add(index)).resp;
                match kind {
                    ResponseKind::Text => zero_and_free_c_string(resp),
                    ResponseKind::Binary => sys::free(resp as *mut c_void),
                }
            }
            ptr::write_bytes(self.ptr, 0, self.kinds.len());
            sys::free(self.ptr as *mut c_void);
        }
    }
}

/// NULL-terminated array of `malloc`ed strings, as returned by `pam_getenvlist`
pub struct NativeStringList(*mut *mut c_char);

impl NativeStringList {
    /// # Safety
    ///
    /// `ptr` must be null or a NULL-terminated array that the caller owns.
    pub unsafe fn from_raw(ptr: *mut *mut c_char) -> Self {
        Self(ptr)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Copy every entry out
    pub fn to_vec(&self) -> Vec<String> {
        let mut entries = Vec::new();
        if self.0.is_null() {
            return entries;
        }
        // Safety: the array is NULL-terminated.
        unsafe {
            let mut cursor = self.0;
            while !(*cursor).is_null() {
                if let Some(entry) = string_from_ptr(*cursor) {
                    entries.push(entry);
                }
                cursor = cursor.add(1);
            }
        }
        entries
    }
}

impl Drop for NativeStringList {
    fn drop(&mut self) {
        if self.0.is_null() {
            return;
        }
        // Safety: we own the array and each entry; entries are zeroed because
        // the environment may hold credentials.
        unsafe {
            let mut cursor = self.0;
            while !(*cursor).is_null() {
                zero_and_free_c_string(*cursor);
                cursor = cursor.add(1);
            }
            sys::free(self.0 as *mut c_void);
        }
    }
}
