//! Shared body of the six `pam_sm_*` entry points

use super::ModuleTransaction;
use crate::error::{ReturnCode, TransactionError};
use crate::ffi::marshal::args_from_argv;
use crate::ffi::{sys, PamLibrary};
use crate::logging;
use crate::types::Flags;
use std::fmt;
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};

/// Service module implementation
///
/// Every event defaults to `Ignore`, so a module only overrides the
/// services it provides.
pub trait ModuleHandler: Send + Sync {
    fn authenticate(
        &self,
        _tx: &ModuleTransaction<'_>,
        _flags: Flags,
        _args: &[String],
    ) -> anyhow::Result<()> {
        Err(ReturnCode::Ignore.into())
    }

    fn set_cred(
        &self,
        _tx: &ModuleTransaction<'_>,
        _flags: Flags,
        _args: &[String],
    ) -> anyhow::Result<()> {
        Err(ReturnCode::Ignore.into())
    }

    fn acct_mgmt(
        &self,
        _tx: &ModuleTransaction<'_>,
        _flags: Flags,
        _args: &[String],
    ) -> anyhow::Result<()> {
        Err(ReturnCode::Ignore.into())
    }

    fn open_session(
        &self,
        _tx: &ModuleTransaction<'_>,
        _flags: Flags,
        _args: &[String],
    ) -> anyhow::Result<()> {
        Err(ReturnCode::Ignore.into())
    }

    fn close_session(
        &self,
        _tx: &ModuleTransaction<'_>,
        _flags: Flags,
        _args: &[String],
    ) -> anyhow::Result<()> {
        Err(ReturnCode::Ignore.into())
    }

    fn change_auth_tok(
        &self,
        _tx: &ModuleTransaction<'_>,
        _flags: Flags,
        _args: &[String],
    ) -> anyhow::Result<()> {
        Err(ReturnCode::Ignore.into())
    }
}

/// One of the six module entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleEvent {
    Authenticate,
    SetCred,
    AcctMgmt,
    OpenSession,
    CloseSession,
    ChangeAuthTok,
}

impl ModuleEvent {
    pub const ALL: [ModuleEvent; 6] = [
        ModuleEvent::Authenticate,
        ModuleEvent::SetCred,
        ModuleEvent::AcctMgmt,
        ModuleEvent::OpenSession,
        ModuleEvent::CloseSession,
        ModuleEvent::ChangeAuthTok,
    ];

    /// Exported symbol name
    pub fn symbol(self) -> &'static str {
        match self {
            ModuleEvent::Authenticate => "pam_sm_authenticate",
            ModuleEvent::SetCred => "pam_sm_setcred",
            ModuleEvent::AcctMgmt => "pam_sm_acct_mgmt",
            ModuleEvent::OpenSession => "pam_sm_open_session",
            ModuleEvent::CloseSession => "pam_sm_close_session",
            ModuleEvent::ChangeAuthTok => "pam_sm_chauthtok",
        }
    }

    /// Route to the matching [`ModuleHandler`] method
    pub fn invoke(
        self,
        handler: &dyn ModuleHandler,
        tx: &ModuleTransaction<'_>,
        flags: Flags,
        args: &[String],
    ) -> anyhow::Result<()> {
        match self {
            ModuleEvent::Authenticate => handler.authenticate(tx, flags, args),
            ModuleEvent::SetCred => handler.set_cred(tx, flags, args),
            ModuleEvent::AcctMgmt => handler.acct_mgmt(tx, flags, args),
            ModuleEvent::OpenSession => handler.open_session(tx, flags, args),
            ModuleEvent::CloseSession => handler.close_session(tx, flags, args),
            ModuleEvent::ChangeAuthTok => handler.change_auth_tok(tx, flags, args),
        }
    }
}

impl fmt::Display for ModuleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleEvent::Authenticate => "Authenticate",
            ModuleEvent::SetCred => "SetCred",
            ModuleEvent::AcctMgmt => "AcctMgmt",
            ModuleEvent::OpenSession => "OpenSession",
            ModuleEvent::CloseSession => "CloseSession",
            ModuleEvent::ChangeAuthTok => "ChangeAuthTok",
        };
        f.write_str(name)
    }
}

/// Run `event` on `handler` for one native invocation
///
/// Never unwinds: a panicking handler yields `PAM_SYSTEM_ERR`.
///
/// # Safety
///
/// `pamh`, `argc` and `argv` must be the arguments the framework passed to
/// the entry point.
pub unsafe fn dispatch(
    handler: &dyn ModuleHandler,
    event: ModuleEvent,
    pamh: *mut sys::pam_handle_t,
    flags: c_int,
    argc: c_int,
    argv: *const *const c_char,
) -> c_int {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        run(handler, event, pamh, Flags::from_raw(flags), argc, argv)
    }));
    match outcome {
        Ok(code) => code,
        Err(_) => {
            tracing::error!(entry = event.symbol(), "module handler panicked");
            sys::PAM_SYSTEM_ERR
        }
    }
}

unsafe fn run(
    handler: &dyn ModuleHandler,
    event: ModuleEvent,
    pamh: *mut sys::pam_handle_t,
    flags: Flags,
    argc: c_int,
    argv: *const *const c_char,
) -> c_int {
    logging::init_from_config();

    if pamh.is_null() {
        tracing::error!(entry = event.symbol(), "called without a PAM handle");
        return sys::PAM_SYSTEM_ERR;
    }
    let lib = match PamLibrary::global() {
        Ok(lib) => lib,
        Err(e) => {
            tracing::error!(entry = event.symbol(), "{e}");
            return TransactionError::from(e).code().as_raw();
        }
    };

    let args = args_from_argv(argc, argv);
    let tx = ModuleTransaction::from_native(lib, pamh);
    let entry = |tx: &ModuleTransaction<'_>, flags: Flags, args: &[String]| {
        event.invoke(handler, tx, flags, args)
    };
    report(event, flags, tx.invoke_handler(Some(&entry), flags, &args))
}

/// Native code for an invocation outcome, logging failures unless silent
fn report(event: ModuleEvent, flags: Flags, outcome: crate::error::Result<()>) -> c_int {
    match outcome {
        Ok(()) => sys::PAM_SUCCESS,
        Err(e) if e.code() == ReturnCode::Ignore => {
            tracing::debug!(entry = event.symbol(), "ignored");
            e.code().as_raw()
        }
        Err(e) => {
            if !flags.is_silent() {
                tracing::error!(entry = event.symbol(), "{e}");
            }
            e.code().as_raw()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use crate::types::Item;
    use pretty_assertions::assert_eq;
    use std::ptr;

    struct AuthOnly;

    impl ModuleHandler for AuthOnly {
        fn authenticate(
            &self,
            tx: &ModuleTransaction<'_>,
            _flags: Flags,
            args: &[String],
        ) -> anyhow::Result<()> {
            if args.iter().any(|a| a == "deny") {
                return Err(ReturnCode::PermDenied.into());
            }
            tx.get_user(None)?;
            Ok(())
        }
    }

    #[test]
    fn test_symbols() {
        let symbols: Vec<_> = ModuleEvent::ALL.iter().map(|e| e.symbol()).collect();
        assert_eq!(
            symbols,
            vec![
                "pam_sm_authenticate",
                "pam_sm_setcred",
                "pam_sm_acct_mgmt",
                "pam_sm_open_session",
                "pam_sm_close_session",
                "pam_sm_chauthtok",
            ]
        );
    }

    #[test]
    fn test_unimplemented_events_are_ignored() {
        let mock = MockBackend::new().with_user("bob");
        let tx = ModuleTransaction::new(&mock);
        for event in ModuleEvent::ALL {
            let err = event.invoke(&AuthOnly, &tx, Flags::NONE, &[]).err();
            match event {
                ModuleEvent::Authenticate => assert!(err.is_none()),
                _ => assert_eq!(
                    err.and_then(|e| e.chain().find_map(ReturnCode::of)),
                    Some(ReturnCode::Ignore)
                ),
            }
        }
    }

    #[test]
    fn test_report_codes() {
        let mock = MockBackend::new().with_item(Item::Service, "sshd");
        let tx = ModuleTransaction::new(&mock);
        let entry = |tx: &ModuleTransaction<'_>, flags: Flags, args: &[String]| {
            ModuleEvent::Authenticate.invoke(&AuthOnly, tx, flags, args)
        };
        let args = vec!["deny".to_string()];
        let outcome = tx.invoke_handler(Some(&entry), Flags::SILENT, &args);
        assert_eq!(
            report(ModuleEvent::Authenticate, Flags::SILENT, outcome),
            sys::PAM_PERM_DENIED
        );
    }

    #[test]
    fn test_null_handle_is_system_error() {
        let code = unsafe {
            dispatch(&AuthOnly, ModuleEvent::Authenticate, ptr::null_mut(), 0, 0, ptr::null())
        };
        assert_eq!(code, sys::PAM_SYSTEM_ERR);
    }
}
