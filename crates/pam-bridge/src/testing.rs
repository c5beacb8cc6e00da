//! In-memory backend for exercising module code without libpam
//!
//! [`MockBackend`] keeps items, module data and the environment in memory.
//! Conversations still cross a real C boundary: the registered handler is
//! reached through the same `extern "C"` trampoline applications use, and
//! module data is released through the same cleanup hook libpam would call.

use crate::backend::{release_data, Backend, RawResult};
use crate::conversation::trampoline::Conversation;
use crate::conversation::ConversationHandler;
use crate::error::ReturnCode;
use crate::ffi::marshal::{string_from_ptr, MessageArrayBuilder, NativeResponses, ResponseKind};
use crate::ffi::sys;
use crate::handle::Handle;
use crate::types::{Item, Style};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ffi::CStr;
use std::os::raw::{c_int, c_void};
use std::ptr;

const DEFAULT_USER_PROMPT: &str = "login: ";

#[derive(Default)]
struct MockState {
    items: HashMap<Item, String>,
    data: HashMap<String, usize>,
    env: BTreeMap<String, String>,
    failure: Option<c_int>,
}

/// Session state held in memory
#[derive(Default)]
pub struct MockBackend {
    state: RefCell<MockState>,
    conversation: Option<(Handle, Box<sys::pam_conv>)>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, item: Item, value: &str) -> Self {
        self.state.borrow_mut().items.insert(item, value.to_string());
        self
    }

    pub fn with_user(self, user: &str) -> Self {
        self.with_item(Item::User, user)
    }

    /// Register an application-side conversation handler
    pub fn with_conversation(mut self, handler: impl ConversationHandler + 'static) -> Self {
        if let Some((previous, _)) = self.conversation.take() {
            previous.release();
        }
        self.conversation = Some(Conversation::new(Box::new(handler)).register());
        self
    }

    /// Make every status-returning call fail with `code`
    pub fn failing(self, code: ReturnCode) -> Self {
        self.state.borrow_mut().failure = Some(code.as_raw());
        self
    }

    /// Stop failing
    pub fn recover(&self) {
        self.state.borrow_mut().failure = None;
    }

    /// Keys with module data installed
    pub fn data_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.state.borrow().data.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self) -> RawResult<()> {
        match self.state.borrow().failure {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn ask_user(&self, prompt: &str) -> RawResult<String> {
        let conv = self.conversation()?.ok_or(sys::PAM_CONV_ERR)?;
        let conv_fn = conv.conv.ok_or(sys::PAM_CONV_ERR)?;

        let mut builder = MessageArrayBuilder::new();
        builder
            .text(Style::PromptEchoOn, prompt)
            .map_err(|_| sys::PAM_BUF_ERR)?;
        let mut messages = builder.build();
        let mut raw = ptr::null_mut();
        // Safety: messages outlive the call; the response array is reclaimed below.
        let status = unsafe { conv_fn(1, messages.as_native(), &mut raw, conv.appdata_ptr) };
        let responses = unsafe { NativeResponses::from_raw(raw, vec![ResponseKind::Text]) };
        if status != sys::PAM_SUCCESS {
            return Err(status);
        }
        // Safety: text response, null reads as absent.
        unsafe { string_from_ptr(responses.get(0)) }.ok_or(sys::PAM_CONV_ERR)
    }
}

impl Backend for MockBackend {
    fn set_item(&self, item: Item, value: &CStr) -> RawResult<()> {
        self.check()?;
        self.state
            .borrow_mut()
            .items
            .insert(item, value.to_string_lossy().into_owned());
        Ok(())
    }

    fn get_item(&self, item: Item) -> RawResult<Option<String>> {
        self.check()?;
        Ok(self.state.borrow().items.get(&item).cloned())
    }

    fn conversation(&self) -> RawResult<Option<sys::pam_conv>> {
        self.check()?;
        Ok(self.conversation.as_ref().map(|(_, conv)| **conv))
    }

    fn get_user(&self, prompt: Option<&CStr>) -> RawResult<String> {
        self.check()?;
        let (known, configured_prompt) = {
            let state = self.state.borrow();
            (
                state.items.get(&Item::User).filter(|u| !u.is_empty()).cloned(),
                state.items.get(&Item::UserPrompt).cloned(),
            )
        };
        if let Some(user) = known {
            return Ok(user);
        }
        let prompt = prompt
            .map(|p| p.to_string_lossy().into_owned())
            .or(configured_prompt)
            .unwrap_or_else(|| DEFAULT_USER_PROMPT.to_string());
        let user = self.ask_user(&prompt)?;
        self.state
            .borrow_mut()
            .items
            .insert(Item::User, user.clone());
        Ok(user)
    }

    fn set_data(&self, key: &CStr, token: usize) -> RawResult<()> {
        self.check()?;
        let key = key.to_string_lossy().into_owned();
        let previous = self.state.borrow_mut().data.insert(key, token);
        if let Some(previous) = previous {
            // Safety: same contract as libpam's replace cleanup.
            unsafe { release_data(ptr::null_mut(), previous as *mut c_void, sys::PAM_DATA_REPLACE) };
        }
        Ok(())
    }

    fn get_data(&self, key: &CStr) -> RawResult<usize> {
        self.check()?;
        let key = key.to_string_lossy();
        self.state
            .borrow()
            .data
            .get(key.as_ref())
            .copied()
            .ok_or(sys::PAM_NO_MODULE_DATA)
    }

    fn put_env(&self, name_value: &CStr) -> RawResult<()> {
        self.check()?;
        let entry = name_value.to_string_lossy();
        let mut state = self.state.borrow_mut();
        match entry.split_once('=') {
            Some(("", _)) => Err(sys::PAM_BAD_ITEM),
            Some((name, value)) => {
                state.env.insert(name.to_string(), value.to_string());
                Ok(())
            }
            None => state
                .env
                .remove(entry.as_ref())
                .map(|_| ())
                .ok_or(sys::PAM_BAD_ITEM),
        }
    }

    fn get_env(&self, name: &CStr) -> Option<String> {
        self.state
            .borrow()
            .env
            .get(name.to_string_lossy().as_ref())
            .cloned()
    }

    fn get_env_list(&self) -> RawResult<Vec<String>> {
        self.check()?;
        Ok(self
            .state
            .borrow()
            .env
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect())
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        let tokens: Vec<usize> = self.state.get_mut().data.drain().map(|(_, t)| t).collect();
        for token in tokens {
            // Safety: teardown cleanup, each token once.
            unsafe { release_data(ptr::null_mut(), token as *mut c_void, sys::PAM_DATA_SILENT) };
        }
        if let Some((handle, _)) = self.conversation.take() {
            handle.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationFunc;
    use pretty_assertions::assert_eq;
    use std::ffi::CString;

    #[test]
    fn test_put_env_semantics() {
        let mock = MockBackend::new();
        let set = |entry: &str| mock.put_env(&CString::new(entry).unwrap());

        assert_eq!(set("A=1"), Ok(()));
        assert_eq!(set("B="), Ok(()));
        assert_eq!(set("=oops"), Err(sys::PAM_BAD_ITEM));
        assert_eq!(set("A"), Ok(()));
        assert_eq!(set("A"), Err(sys::PAM_BAD_ITEM));
        assert_eq!(mock.get_env_list().unwrap(), vec!["B=".to_string()]);
    }

    #[test]
    fn test_get_user_prompts_once() {
        let mock = MockBackend::new().with_conversation(ConversationFunc(
            |style: Style, prompt: &str| -> anyhow::Result<String> {
                assert_eq!(style, Style::PromptEchoOn);
                assert_eq!(prompt, DEFAULT_USER_PROMPT);
                Ok("carol".to_string())
            },
        ));
        assert_eq!(mock.get_user(None).unwrap(), "carol");
        assert_eq!(mock.get_item(Item::User).unwrap().as_deref(), Some("carol"));
    }

    #[test]
    fn test_data_replace_uses_cleanup_hook() {
        let mock = MockBackend::new();
        let key = CString::new("k").unwrap();
        let first = Handle::new(std::sync::Arc::new(1u8));
        let second = Handle::new(std::sync::Arc::new(2u8));

        mock.set_data(&key, first.as_raw()).unwrap();
        mock.set_data(&key, second.as_raw()).unwrap();
        assert!(first.value().is_none());
        assert_eq!(mock.get_data(&key), Ok(second.as_raw()));

        drop(mock);
        assert!(second.value().is_none());
    }
}
