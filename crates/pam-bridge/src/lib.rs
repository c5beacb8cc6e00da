//! pam-bridge - PAM for applications and service modules
//!
//! This library provides both sides of a PAM transaction:
//! - Applications start a [`Transaction`] and answer prompts through a
//!   [`ConversationHandler`]
//! - Service modules implement [`ModuleHandler`], export it with
//!   [`pam_module!`], and talk to the application through a
//!   [`ModuleTransaction`] (conversations, module data, items)
//!
//! Every failure is a [`TransactionError`] carrying one native
//! [`ReturnCode`]. libpam is loaded at runtime, see [`ffi::loader`].

/// pam-bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod application;
pub mod backend;
pub mod conversation;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod logging;
pub mod module;
pub mod status;
pub mod testing;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use application::Transaction;
pub use backend::{Backend, NativeSession};
pub use conversation::{
    has_binary_prompt, BinaryConversationHandler, BinaryPrompt, ConvRequest, ConvResponse,
    ConversationFunc, ConversationHandler, FramingError,
};
pub use error::{Result, ReturnCode, TransactionError};
pub use ffi::{LoadError, PamLibrary};
pub use module::{ModuleEvent, ModuleHandler, ModuleTransaction};
pub use status::StatusRegister;
pub use transaction::TransactionBase;
pub use types::{Flags, Item, Style};

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::OnceCell;
}

/// Whether the loaded PAM library provides `pam_start_confdir`
///
/// False when the library cannot be loaded at all.
pub fn has_start_confdir() -> bool {
    PamLibrary::global()
        .map(PamLibrary::has_start_confdir)
        .unwrap_or(false)
}
