//! Example service module
//!
//! Build with `cargo build -p pam-example-module` and reference the
//! resulting `libpam_example.so` from a service file:
//!
//! ```text
//! auth     optional  /path/to/libpam_example.so debug
//! account  optional  /path/to/libpam_example.so
//! ```

use pam_bridge::{
    pam_module, Flags, ModuleEvent, ModuleHandler, ModuleTransaction, ReturnCode,
    TransactionError,
};

/// Declines to authenticate and ignores every other event
#[derive(Debug, Default)]
pub struct ExampleHandler;

fn not_implemented(event: ModuleEvent) -> anyhow::Error {
    TransactionError::wrap(ReturnCode::Ignore, format!("{event} not implemented")).into()
}

impl ModuleHandler for ExampleHandler {
    fn authenticate(
        &self,
        _tx: &ModuleTransaction<'_>,
        _flags: Flags,
        args: &[String],
    ) -> anyhow::Result<()> {
        tracing::debug!(?args, "authenticate");
        Err(ReturnCode::AuthinfoUnavail.into())
    }

    fn set_cred(&self, _: &ModuleTransaction<'_>, _: Flags, _: &[String]) -> anyhow::Result<()> {
        Err(not_implemented(ModuleEvent::SetCred))
    }

    fn acct_mgmt(&self, _: &ModuleTransaction<'_>, _: Flags, _: &[String]) -> anyhow::Result<()> {
        Err(not_implemented(ModuleEvent::AcctMgmt))
    }

    fn open_session(
        &self,
        _: &ModuleTransaction<'_>,
        _: Flags,
        _: &[String],
    ) -> anyhow::Result<()> {
        Err(not_implemented(ModuleEvent::OpenSession))
    }

    fn close_session(
        &self,
        _: &ModuleTransaction<'_>,
        _: Flags,
        _: &[String],
    ) -> anyhow::Result<()> {
        Err(not_implemented(ModuleEvent::CloseSession))
    }

    fn change_auth_tok(
        &self,
        _: &ModuleTransaction<'_>,
        _: Flags,
        _: &[String],
    ) -> anyhow::Result<()> {
        Err(not_implemented(ModuleEvent::ChangeAuthTok))
    }
}

pam_module!(ExampleHandler);
