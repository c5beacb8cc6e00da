//! Items, flags and conversation styles

use crate::ffi::sys;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::os::raw::c_int;

/// String items readable and writable through `pam_{get,set}_item`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Item {
    /// Name which identifies the PAM stack
    Service = sys::PAM_SERVICE,
    /// Username identity used by a service
    User = sys::PAM_USER,
    /// Terminal name
    Tty = sys::PAM_TTY,
    /// Requesting host name
    Rhost = sys::PAM_RHOST,
    /// Currently active authentication token
    Authtok = sys::PAM_AUTHTOK,
    /// Old authentication token
    OldAuthtok = sys::PAM_OLDAUTHTOK,
    /// Requesting user name
    Ruser = sys::PAM_RUSER,
    /// Prompt used when asking for a user name
    UserPrompt = sys::PAM_USER_PROMPT,
}

impl Item {
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

/// Bitmask passed through to native operations
///
/// Meanings are defined by PAM; which flags an operation accepts is
/// documented on the operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(c_int);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// No messages should be emitted
    pub const SILENT: Flags = Flags(sys::PAM_SILENT);
    /// Fail when the user has no registered authentication token
    pub const DISALLOW_NULL_AUTHTOK: Flags = Flags(sys::PAM_DISALLOW_NULL_AUTHTOK);
    pub const ESTABLISH_CRED: Flags = Flags(sys::PAM_ESTABLISH_CRED);
    pub const DELETE_CRED: Flags = Flags(sys::PAM_DELETE_CRED);
    pub const REINITIALIZE_CRED: Flags = Flags(sys::PAM_REINITIALIZE_CRED);
    /// Extend the lifetime of existing credentials
    pub const REFRESH_CRED: Flags = Flags(sys::PAM_REFRESH_CRED);
    /// Only change the token if it has expired
    pub const CHANGE_EXPIRED_AUTHTOK: Flags = Flags(sys::PAM_CHANGE_EXPIRED_AUTHTOK);

    /// Wrap a native bitmask verbatim, unknown bits included
    pub const fn from_raw(bits: c_int) -> Self {
        Flags(bits)
    }

    pub const fn as_raw(self) -> c_int {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_silent(self) -> bool {
        self.contains(Flags::SILENT)
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({:#x})", self.0)
    }
}

/// Kind of conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Style {
    /// Obtain a string without echoing input
    PromptEchoOff = sys::PAM_PROMPT_ECHO_OFF,
    /// Obtain a string while echoing input
    PromptEchoOn = sys::PAM_PROMPT_ECHO_ON,
    /// Display an error message
    ErrorMsg = sys::PAM_ERROR_MSG,
    /// Display some text
    TextInfo = sys::PAM_TEXT_INFO,
    /// Private binary protocol (Linux-PAM extension)
    BinaryPrompt = sys::PAM_BINARY_PROMPT,
}

impl Style {
    pub fn from_raw(style: c_int) -> Option<Self> {
        match style {
            sys::PAM_PROMPT_ECHO_OFF => Some(Style::PromptEchoOff),
            sys::PAM_PROMPT_ECHO_ON => Some(Style::PromptEchoOn),
            sys::PAM_ERROR_MSG => Some(Style::ErrorMsg),
            sys::PAM_TEXT_INFO => Some(Style::TextInfo),
            sys::PAM_BINARY_PROMPT => Some(Style::BinaryPrompt),
            _ => None,
        }
    }

    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    /// Whether messages of this style carry text
    pub fn is_text(self) -> bool {
        !matches!(self, Style::BinaryPrompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_flags_combine() {
        let flags = Flags::SILENT | Flags::DISALLOW_NULL_AUTHTOK;
        assert!(flags.is_silent());
        assert!(flags.contains(Flags::DISALLOW_NULL_AUTHTOK));
        assert!(!flags.contains(Flags::DELETE_CRED));
        assert!(!Flags::NONE.is_silent());
    }

    #[test]
    fn test_flags_pass_unknown_bits_through() {
        let flags = Flags::from_raw(0x4000_0001);
        assert_eq!(flags.as_raw(), 0x4000_0001);
    }

    #[rstest]
    #[case(1, Some(Style::PromptEchoOff))]
    #[case(2, Some(Style::PromptEchoOn))]
    #[case(3, Some(Style::ErrorMsg))]
    #[case(4, Some(Style::TextInfo))]
    #[case(7, Some(Style::BinaryPrompt))]
    #[case(0, None)]
    #[case(5, None)]
    fn test_style_from_raw(#[case] raw: c_int, #[case] expected: Option<Style>) {
        assert_eq!(Style::from_raw(raw), expected);
    }
}
