//! Application side: starting and driving a PAM transaction

use crate::backend::{check, NativeSession};
use crate::conversation::trampoline::Conversation;
use crate::conversation::{has_binary_prompt, ConversationFunc, ConversationHandler};
use crate::error::{Result, ReturnCode, TransactionError};
use crate::ffi::{sys, PamLibrary};
use crate::handle::Handle;
use crate::transaction::TransactionBase;
use crate::types::{Flags, Style};
use pam_bridge_config::ConfigLoader;
use std::ffi::CString;
use std::ops::Deref;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

/// An application's PAM session
///
/// Ends the session with the last recorded status when dropped, or
/// explicitly through [`Transaction::end`]. May be moved between threads
/// but not shared by them.
pub struct Transaction {
    base: TransactionBase<'static>,
    session: NativeSession,
    conversation: Handle,
    // libpam may keep pointing at this for the session's lifetime.
    _conv: Box<sys::pam_conv>,
    ended: bool,
}

// Safety: the native handle is only touched through &self methods of a
// non-Sync value, so at most one thread uses it at a time.
unsafe impl Send for Transaction {}

impl Transaction {
    /// Start a transaction for `service`, optionally with a known user
    ///
    /// Uses the configured service directory (`application.confdir`) when
    /// one is set.
    pub fn start(
        service: &str,
        user: Option<&str>,
        handler: impl ConversationHandler + 'static,
    ) -> Result<Self> {
        let confdir = ConfigLoader::new()
            .load()
            .map_err(|e| tracing::warn!("ignoring pam-bridge configuration: {e}"))
            .ok()
            .and_then(|config| config.application.confdir);
        Self::begin(service, user, Box::new(handler), confdir.as_deref())
    }

    /// [`Transaction::start`] with a closure as conversation handler
    pub fn start_func<F>(service: &str, user: Option<&str>, respond: F) -> Result<Self>
    where
        F: Fn(Style, &str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::start(service, user, ConversationFunc(respond))
    }

    /// Start a transaction reading service files from `confdir`
    ///
    /// Requires `pam_start_confdir` (Linux-PAM 1.4 and later).
    pub fn start_confdir(
        service: &str,
        user: Option<&str>,
        handler: impl ConversationHandler + 'static,
        confdir: &Path,
    ) -> Result<Self> {
        Self::begin(service, user, Box::new(handler), Some(confdir))
    }

    fn begin(
        service: &str,
        user: Option<&str>,
        handler: Box<dyn ConversationHandler>,
        confdir: Option<&Path>,
    ) -> Result<Self> {
        let lib = PamLibrary::global()?;

        let conversation = Conversation::new(handler);
        if conversation.is_binary() && !has_binary_prompt() {
            return Err(TransactionError::wrap(
                ReturnCode::SystemErr,
                "binary conversations are not supported on this platform",
            ));
        }
        let start_confdir = match confdir {
            Some(_) => Some(lib.start_confdir.ok_or_else(|| {
                TransactionError::wrap(ReturnCode::SystemErr, "pam_start_confdir is not available")
            })?),
            None => None,
        };

        let service_c = c_arg(service)?;
        let user_c = user.map(c_arg).transpose()?;
        let confdir_c = confdir
            .map(|dir| c_arg_bytes(dir.as_os_str().as_bytes()))
            .transpose()?;

        let (handle, conv) = conversation.register();
        let mut pamh = ptr::null_mut();
        let user_ptr = user_c.as_ref().map_or(ptr::null(), |u| u.as_ptr());
        // Safety: every pointer stays valid for the call; libpam copies the
        // strings and the conversation struct.
        let status = unsafe {
            match (start_confdir, &confdir_c) {
                (Some(start), Some(dir)) => {
                    start(service_c.as_ptr(), user_ptr, &*conv, dir.as_ptr(), &mut pamh)
                }
                _ => (lib.start)(service_c.as_ptr(), user_ptr, &*conv, &mut pamh),
            }
        };
        if status != sys::PAM_SUCCESS || pamh.is_null() {
            handle.release();
            return Err(start_failure(service, status));
        }
        tracing::debug!(service, library = lib.name(), "transaction started");

        // Safety: pamh was just created by lib and is ended only by us.
        let session = unsafe { NativeSession::from_raw(lib, pamh) };
        Ok(Self {
            base: TransactionBase::new(Box::new(session)),
            session,
            conversation: handle,
            _conv: conv,
            ended: false,
        })
    }

    /// Authenticate the user
    ///
    /// Accepts `SILENT` and `DISALLOW_NULL_AUTHTOK`.
    pub fn authenticate(&self, flags: Flags) -> Result<()> {
        self.track(self.session.authenticate(flags))
    }

    /// Establish, delete, reinitialise or refresh credentials, as selected
    /// by `flags`
    pub fn set_cred(&self, flags: Flags) -> Result<()> {
        self.track(self.session.set_cred(flags))
    }

    pub fn establish_cred(&self, flags: Flags) -> Result<()> {
        self.set_cred(flags | Flags::ESTABLISH_CRED)
    }

    pub fn delete_cred(&self, flags: Flags) -> Result<()> {
        self.set_cred(flags | Flags::DELETE_CRED)
    }

    pub fn reinitialize_cred(&self, flags: Flags) -> Result<()> {
        self.set_cred(flags | Flags::REINITIALIZE_CRED)
    }

    pub fn refresh_cred(&self, flags: Flags) -> Result<()> {
        self.set_cred(flags | Flags::REFRESH_CRED)
    }

    /// Validate the account (expiry, access restrictions)
    pub fn acct_mgmt(&self, flags: Flags) -> Result<()> {
        self.track(self.session.acct_mgmt(flags))
    }

    /// Change the authentication token
    ///
    /// Accepts `SILENT` and `CHANGE_EXPIRED_AUTHTOK`.
    pub fn change_auth_tok(&self, flags: Flags) -> Result<()> {
        self.track(self.session.chauthtok(flags))
    }

    pub fn open_session(&self, flags: Flags) -> Result<()> {
        self.track(self.session.open_session(flags))
    }

    pub fn close_session(&self, flags: Flags) -> Result<()> {
        self.track(self.session.close_session(flags))
    }

    /// End the session now and report `pam_end`'s own status
    pub fn end(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;
        let status = self.session.end(self.status_raw());
        self.conversation.release();
        tracing::debug!(status, "transaction ended");
        check(status).map_err(TransactionError::from_raw)
    }
}

impl Deref for Transaction {
    type Target = TransactionBase<'static>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!("pam_end failed: {e}");
        }
    }
}

fn start_failure(service: &str, status: std::os::raw::c_int) -> TransactionError {
    TransactionError::wrap(
        ReturnCode::classify(status),
        format!("pam_start failed for service {service:?}"),
    )
}

fn c_arg(value: &str) -> Result<CString> {
    c_arg_bytes(value.as_bytes())
}

fn c_arg_bytes(value: &[u8]) -> Result<CString> {
    CString::new(value).map_err(|e| TransactionError::wrap(ReturnCode::SystemErr, e))
}
