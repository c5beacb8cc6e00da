//! Native PAM boundary
//!
//! - `sys`: C layouts, constants and entry point signatures
//! - `loader`: runtime resolution of libpam entry points
//! - `marshal`: RAII ownership of buffers crossing the boundary
//!
//! # Safety
//!
//! All raw pointer handling of the crate lives here and in the two
//! `extern "C"` callbacks (conversation trampoline, data cleanup); the rest
//! of the crate goes through the safe wrappers.

pub mod loader;
pub mod marshal;
pub mod sys;

pub use loader::{LoadError, PamLibrary};
