//! Native return codes and the chainable transaction error
//!
//! Every failure surfaced by this crate is, or wraps, one [`ReturnCode`].
//! Callers test for a specific code through chain inspection
//! ([`ReturnCode::find_in`], [`TransactionError::code`]) rather than by
//! comparing message text.

use crate::ffi::sys;
use std::error::Error as StdError;
use std::fmt;
use std::os::raw::c_int;
use thiserror::Error;

/// Boxed cause carried by a [`TransactionError`]
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// Result type for transaction operations
pub type Result<T, E = TransactionError> = std::result::Result<T, E>;

/// Closed set of PAM return codes
///
/// Messages match `pam_strerror` from Linux-PAM.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ReturnCode {
    #[error("Success")]
    Success = sys::PAM_SUCCESS,
    #[error("Failed to load module")]
    OpenErr = sys::PAM_OPEN_ERR,
    #[error("Symbol not found")]
    SymbolErr = sys::PAM_SYMBOL_ERR,
    #[error("Error in service module")]
    ServiceErr = sys::PAM_SERVICE_ERR,
    #[error("System error")]
    SystemErr = sys::PAM_SYSTEM_ERR,
    #[error("Memory buffer error")]
    BufErr = sys::PAM_BUF_ERR,
    #[error("Permission denied")]
    PermDenied = sys::PAM_PERM_DENIED,
    #[error("Authentication failure")]
    AuthErr = sys::PAM_AUTH_ERR,
    #[error("Insufficient credentials to access authentication data")]
    CredInsufficient = sys::PAM_CRED_INSUFFICIENT,
    #[error("Authentication service cannot retrieve authentication info")]
    AuthinfoUnavail = sys::PAM_AUTHINFO_UNAVAIL,
    #[error("User not known to the underlying authentication module")]
    UserUnknown = sys::PAM_USER_UNKNOWN,
    #[error("Have exhausted maximum number of retries for service")]
    MaxTries = sys::PAM_MAXTRIES,
    #[error("Authentication token is no longer valid; new one required")]
    NewAuthtokReqd = sys::PAM_NEW_AUTHTOK_REQD,
    #[error("User account has expired")]
    AcctExpired = sys::PAM_ACCT_EXPIRED,
    #[error("Cannot make/remove an entry for the specified session")]
    SessionErr = sys::PAM_SESSION_ERR,
    #[error("Authentication service cannot retrieve user credentials")]
    CredUnavail = sys::PAM_CRED_UNAVAIL,
    #[error("User credentials expired")]
    CredExpired = sys::PAM_CRED_EXPIRED,
    #[error("Failure setting user credentials")]
    CredErr = sys::PAM_CRED_ERR,
    #[error("No module specific data is present")]
    NoModuleData = sys::PAM_NO_MODULE_DATA,
    #[error("Conversation error")]
    ConvErr = sys::PAM_CONV_ERR,
    #[error("Authentication token manipulation error")]
    AuthtokErr = sys::PAM_AUTHTOK_ERR,
    #[error("Authentication information cannot be recovered")]
    AuthtokRecoveryErr = sys::PAM_AUTHTOK_RECOVERY_ERR,
    #[error("Authentication token lock busy")]
    AuthtokLockBusy = sys::PAM_AUTHTOK_LOCK_BUSY,
    #[error("Authentication token aging disabled")]
    AuthtokDisableAging = sys::PAM_AUTHTOK_DISABLE_AGING,
    #[error("Failed preliminary check by password service")]
    TryAgain = sys::PAM_TRY_AGAIN,
    #[error("The return value should be ignored by PAM dispatch")]
    Ignore = sys::PAM_IGNORE,
    #[error("Critical error - immediate abort")]
    Abort = sys::PAM_ABORT,
    #[error("Authentication token expired")]
    AuthtokExpired = sys::PAM_AUTHTOK_EXPIRED,
    #[error("Module is unknown")]
    ModuleUnknown = sys::PAM_MODULE_UNKNOWN,
    #[error("Bad item passed to pam_*_item()")]
    BadItem = sys::PAM_BAD_ITEM,
    #[error("Conversation is waiting for event")]
    ConvAgain = sys::PAM_CONV_AGAIN,
    #[error("Application needs to call libpam again")]
    Incomplete = sys::PAM_INCOMPLETE,
}

impl ReturnCode {
    /// Exact mapping; `None` for values outside the enumeration
    pub fn from_raw(code: c_int) -> Option<Self> {
        use ReturnCode::*;
        let rc = match code {
            sys::PAM_SUCCESS => Success,
            sys::PAM_OPEN_ERR => OpenErr,
            sys::PAM_SYMBOL_ERR => SymbolErr,
            sys::PAM_SERVICE_ERR => ServiceErr,
            sys::PAM_SYSTEM_ERR => SystemErr,
            sys::PAM_BUF_ERR => BufErr,
            sys::PAM_PERM_DENIED => PermDenied,
            sys::PAM_AUTH_ERR => AuthErr,
            sys::PAM_CRED_INSUFFICIENT => CredInsufficient,
            sys::PAM_AUTHINFO_UNAVAIL => AuthinfoUnavail,
            sys::PAM_USER_UNKNOWN => UserUnknown,
            sys::PAM_MAXTRIES => MaxTries,
            sys::PAM_NEW_AUTHTOK_REQD => NewAuthtokReqd,
            sys::PAM_ACCT_EXPIRED => AcctExpired,
            sys::PAM_SESSION_ERR => SessionErr,
            sys::PAM_CRED_UNAVAIL => CredUnavail,
            sys::PAM_CRED_EXPIRED => CredExpired,
            sys::PAM_CRED_ERR => CredErr,
            sys::PAM_NO_MODULE_DATA => NoModuleData,
            sys::PAM_CONV_ERR => ConvErr,
            sys::PAM_AUTHTOK_ERR => AuthtokErr,
            sys::PAM_AUTHTOK_RECOVERY_ERR => AuthtokRecoveryErr,
            sys::PAM_AUTHTOK_LOCK_BUSY => AuthtokLockBusy,
            sys::PAM_AUTHTOK_DISABLE_AGING => AuthtokDisableAging,
            sys::PAM_TRY_AGAIN => TryAgain,
            sys::PAM_IGNORE => Ignore,
            sys::PAM_ABORT => Abort,
            sys::PAM_AUTHTOK_EXPIRED => AuthtokExpired,
            sys::PAM_MODULE_UNKNOWN => ModuleUnknown,
            sys::PAM_BAD_ITEM => BadItem,
            sys::PAM_CONV_AGAIN => ConvAgain,
            sys::PAM_INCOMPLETE => Incomplete,
            _ => return None,
        };
        Some(rc)
    }

    /// Total mapping: anything unknown is a system error
    pub fn classify(code: c_int) -> Self {
        Self::from_raw(code).unwrap_or(ReturnCode::SystemErr)
    }

    /// The integer handed back to the native framework
    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    pub fn is_success(self) -> bool {
        self == ReturnCode::Success
    }

    /// Code carried by this exact error value, without walking `source()`
    pub fn of(err: &(dyn StdError + 'static)) -> Option<Self> {
        if let Some(tx) = err.downcast_ref::<TransactionError>() {
            return Some(tx.code());
        }
        err.downcast_ref::<ReturnCode>().copied()
    }

    /// First native code found along the `source()` chain
    pub fn find_in(err: &(dyn StdError + 'static)) -> Option<Self> {
        let mut current = Some(err);
        while let Some(e) = current {
            if let Some(code) = Self::of(e) {
                return Some(code);
            }
            current = e.source();
        }
        None
    }
}

impl From<ReturnCode> for c_int {
    fn from(code: ReturnCode) -> Self {
        code.as_raw()
    }
}

/// A native return code paired with an optional cause
///
/// Renders as `"<cause>: <native message>"`, or just the native message
/// when there is no cause.
#[derive(Debug)]
pub struct TransactionError {
    code: ReturnCode,
    cause: Option<Cause>,
}

impl TransactionError {
    /// Build an error, normalising `Success` to `SystemErr` so an error
    /// value never carries the success code.
    pub fn new(code: ReturnCode, cause: Option<Cause>) -> Self {
        let code = if code.is_success() {
            ReturnCode::SystemErr
        } else {
            code
        };
        Self { code, cause }
    }

    /// Error carrying a descriptive cause
    pub fn wrap(code: ReturnCode, cause: impl Into<Cause>) -> Self {
        Self::new(code, Some(cause.into()))
    }

    /// Error for a raw native status
    pub fn from_raw(code: c_int) -> Self {
        Self::new(ReturnCode::classify(code), None)
    }

    pub fn code(&self) -> ReturnCode {
        self.code
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Prefix the cause with `"<service> failed"`, keeping the code.
    ///
    /// An empty service name leaves the error untouched.
    pub fn with_service(self, service: &str) -> Self {
        if service.is_empty() {
            return self;
        }
        let failure = ServiceFailure {
            service: service.to_string(),
            source: self.cause,
        };
        Self {
            code: self.code,
            cause: Some(Box::new(failure)),
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", cause, self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

impl StdError for TransactionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl From<ReturnCode> for TransactionError {
    fn from(code: ReturnCode) -> Self {
        Self::new(code, None)
    }
}

impl PartialEq<ReturnCode> for TransactionError {
    fn eq(&self, other: &ReturnCode) -> bool {
        self.code == *other
    }
}

/// Cause installed by [`TransactionError::with_service`]
#[derive(Debug)]
struct ServiceFailure {
    service: String,
    source: Option<Cause>,
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} failed: {}", self.service, source),
            None => write!(f, "{} failed", self.service),
        }
    }
}

impl StdError for ServiceFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}
