//! Native conversation callback for applications
//!
//! Every caller-side transaction registers the same `extern "C"` function
//! with `pam_start`. The `appdata_ptr` it receives is a [`Handle`] token
//! naming the transaction's [`Conversation`].

use super::{BinaryPrompt, ConversationHandler};
use crate::backend::RawResult;
use crate::ffi::marshal::{dup_bytes, dup_c_string, string_from_ptr, NativeResponses, ResponseKind};
use crate::ffi::sys;
use crate::handle::Handle;
use crate::types::Style;
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Handler registered for one transaction
pub(crate) struct Conversation {
    handler: Box<dyn ConversationHandler>,
    binary: bool,
}

impl Conversation {
    /// Capture the handler, resolving its binary capability once
    pub(crate) fn new(handler: Box<dyn ConversationHandler>) -> Self {
        let binary = handler.as_binary().is_some();
        Self { handler, binary }
    }

    pub(crate) fn is_binary(&self) -> bool {
        self.binary
    }

    /// Store in the handle table and build the matching `pam_conv`
    pub(crate) fn register(self) -> (Handle, Box<sys::pam_conv>) {
        let handle = Handle::new(Arc::new(self));
        let conv = Box::new(sys::pam_conv {
            conv: Some(conversation_trampoline),
            appdata_ptr: handle.as_raw() as *mut c_void,
        });
        (handle, conv)
    }

    fn answer(&self, style: Style, message: &sys::pam_message) -> RawResult<*mut c_char> {
        if style.is_text() {
            // Safety: text messages are NUL-terminated.
            let prompt = unsafe { string_from_ptr(message.msg) }.unwrap_or_default();
            let text = self.handler.respond(style, &prompt).map_err(|e| {
                tracing::debug!(?style, "conversation handler failed: {e:#}");
                sys::PAM_CONV_ERR
            })?;
            return dup_c_string(&text).ok_or(sys::PAM_CONV_ERR);
        }

        let handler = match self.handler.as_binary() {
            Some(handler) if self.binary => handler,
            _ => {
                tracing::debug!("binary prompt sent to a text-only conversation handler");
                return Err(sys::PAM_CONV_ERR);
            }
        };
        // Safety: binary messages carry a libpamc frame.
        let prompt = unsafe { BinaryPrompt::from_native(message.msg as *const u8) }.map_err(|e| {
            tracing::debug!("{e}");
            sys::PAM_CONV_ERR
        })?;
        let reply = handler
            .respond_binary(&prompt)
            .map_err(|e| {
                tracing::debug!("binary conversation handler failed: {e:#}");
                sys::PAM_CONV_ERR
            })?
            .encode()
            .map_err(|_| sys::PAM_CONV_ERR)?;
        dup_bytes(&reply)
            .map(|buf| buf as *mut c_char)
            .ok_or(sys::PAM_CONV_ERR)
    }
}

/// `struct pam_conv::conv` for every caller-side transaction
///
/// On failure `*resp` is left null and nothing allocated here survives.
pub(crate) unsafe extern "C" fn conversation_trampoline(
    num_msg: c_int,
    msg: *mut *const sys::pam_message,
    resp: *mut *mut sys::pam_response,
    appdata_ptr: *mut c_void,
) -> c_int {
    if resp.is_null() {
        return sys::PAM_CONV_ERR;
    }
    *resp = std::ptr::null_mut();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| converse(num_msg, msg, appdata_ptr)));
    match outcome {
        Ok(Ok(responses)) => {
            *resp = responses.into_raw();
            sys::PAM_SUCCESS
        }
        Ok(Err(code)) => code,
        Err(_) => {
            tracing::error!("conversation handler panicked");
            sys::PAM_CONV_ERR
        }
    }
}

unsafe fn converse(
    num_msg: c_int,
    msg: *mut *const sys::pam_message,
    appdata_ptr: *mut c_void,
) -> RawResult<NativeResponses> {
    if num_msg <= 0 || num_msg as usize > sys::PAM_MAX_NUM_MSG || msg.is_null() {
        return Err(sys::PAM_CONV_ERR);
    }
    let conversation = Handle::from_raw(appdata_ptr as usize)
        .and_then(Handle::downcast::<Conversation>)
        .ok_or(sys::PAM_CONV_ERR)?;

    let count = num_msg as usize;
    let mut messages = Vec::with_capacity(count);
    for index in 0..count {
        let message = *msg.add(index);
        if message.is_null() {
            return Err(sys::PAM_CONV_ERR);
        }
        let message = &*message;
        let style = Style::from_raw(message.msg_style).ok_or(sys::PAM_CONV_ERR)?;
        messages.push((style, message));
    }

    let kinds = messages
        .iter()
        .map(|(style, _)| {
            if style.is_text() {
                ResponseKind::Text
            } else {
                ResponseKind::Binary
            }
        })
        .collect();
    let mut responses = NativeResponses::allocate(kinds).ok_or(sys::PAM_BUF_ERR)?;

    // An early return drops `responses`, freeing every answer so far.
    for (index, (style, message)) in messages.into_iter().enumerate() {
        let answer = conversation.answer(style, message)?;
        responses.set(index, answer);
    }
    tracing::debug!(count, "conversation answered");
    Ok(responses)
}
