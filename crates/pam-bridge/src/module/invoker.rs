//! Running a module handler and folding its error into a native code

use super::ModuleTransaction;
use crate::error::{Result, ReturnCode, TransactionError};
use crate::types::{Flags, Item};

/// Handler for one module entry point
pub type HandlerFn<'h> = dyn Fn(&ModuleTransaction<'_>, Flags, &[String]) -> anyhow::Result<()> + 'h;

impl ModuleTransaction<'_> {
    /// Run `handler` and translate its outcome for the framework
    ///
    /// - no handler: `Ignore`
    /// - `Ignore` anywhere in the error chain: a plain `Ignore` error
    /// - another native code in the chain: that code, with the cause
    ///   prefixed by `"<service> failed"`
    /// - no native code: `SystemErr`, prefixed the same way
    ///
    /// The decided code is recorded once, at the end.
    pub fn invoke_handler(
        &self,
        handler: Option<&HandlerFn<'_>>,
        flags: Flags,
        args: &[String],
    ) -> Result<()> {
        let Some(handler) = handler else {
            return self.settle(Err(ReturnCode::Ignore.into()));
        };
        let outcome = handler(self, flags, args).map_err(|err| self.qualify(err));
        self.settle(outcome)
    }

    fn qualify(&self, err: anyhow::Error) -> TransactionError {
        let code = err.chain().find_map(ReturnCode::of);
        if code == Some(ReturnCode::Ignore) {
            return ReturnCode::Ignore.into();
        }

        // Best effort: the service name only decorates the message.
        let service = self
            .backend()
            .get_item(Item::Service)
            .ok()
            .flatten()
            .unwrap_or_default();

        // Unwrap only when the code sits at the top; context layers stay in
        // the cause.
        let err = match code {
            Some(code) if err.chain().next().and_then(ReturnCode::of).is_some() => {
                match err.downcast::<TransactionError>() {
                    Ok(tx) => tx,
                    Err(err) => match err.downcast::<ReturnCode>() {
                        Ok(code) => code.into(),
                        Err(err) => TransactionError::wrap(code, err),
                    },
                }
            }
            Some(code) => TransactionError::wrap(code, err),
            None => TransactionError::wrap(ReturnCode::SystemErr, err),
        };
        err.with_service(&service)
    }
}
