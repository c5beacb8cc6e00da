//! Per-session module data
//!
//! Values are stored in the handle table and only their token goes into the
//! framework's data table, together with [`crate::backend::release_data`]
//! as cleanup hook. The framework runs that hook when a key is replaced and
//! when the session ends, so every stored value is released exactly once.

use super::ModuleTransaction;
use crate::error::{Result, ReturnCode, TransactionError};
use crate::handle::{Handle, Shared};
use std::any::{type_name, Any};
use std::ffi::CString;
use std::sync::Arc;

impl ModuleTransaction<'_> {
    /// Store `value` under `key`, replacing (and releasing) any previous
    /// value. `None` clears the key.
    pub fn set_data<T: Any + Send + Sync>(&self, key: &str, value: Option<T>) -> Result<()> {
        self.set_data_shared(key, value.map(|value| Arc::new(value) as Shared))
    }

    /// Untyped [`Self::set_data`]; the store keeps its own reference
    pub fn set_data_shared(&self, key: &str, value: Option<Shared>) -> Result<()> {
        let key = self.settle(data_key(key))?;
        let handle = value.map(Handle::new);
        let token = handle.map_or(0, Handle::as_raw);

        let result = self.backend().set_data(&key, token);
        if result.is_err() {
            if let Some(handle) = handle {
                handle.release();
            }
        }
        self.track(result)
    }

    /// Value stored under `key`
    ///
    /// Fails with `NoModuleData` when nothing is stored and with `SystemErr`
    /// when the stored value is not a `T`.
    pub fn get_data<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        let value = self.get_data_shared(key)?;
        let typed = value.downcast::<T>().map_err(|_| {
            TransactionError::wrap(
                ReturnCode::SystemErr,
                format!("module data '{key}' is not a {}", type_name::<T>()),
            )
        });
        self.settle(typed)
    }

    /// Untyped [`Self::get_data`]; ownership stays with the store
    pub fn get_data_shared(&self, key: &str) -> Result<Shared> {
        let key = self.settle(data_key(key))?;
        let token = self.track(self.backend().get_data(&key))?;
        let value = Handle::from_raw(token)
            .and_then(Handle::value)
            .ok_or_else(|| TransactionError::from(ReturnCode::NoModuleData));
        self.settle(value)
    }
}

fn data_key(key: &str) -> Result<CString> {
    CString::new(key).map_err(|e| TransactionError::wrap(ReturnCode::BadItem, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_roundtrip() {
        let mock = MockBackend::new();
        let tx = ModuleTransaction::new(&mock);

        tx.set_data("attempts", Some(3u32)).unwrap();
        assert_eq!(*tx.get_data::<u32>("attempts").unwrap(), 3);
        assert_eq!(tx.status(), ReturnCode::Success);
    }

    #[test]
    fn test_missing_key() {
        let mock = MockBackend::new();
        let tx = ModuleTransaction::new(&mock);

        let err = tx.get_data::<String>("nothing").unwrap_err();
        assert_eq!(err.code(), ReturnCode::NoModuleData);
        assert_eq!(tx.status(), ReturnCode::NoModuleData);
    }

    #[test]
    fn test_clear_key() {
        let mock = MockBackend::new();
        let tx = ModuleTransaction::new(&mock);

        tx.set_data("token", Some("abc".to_string())).unwrap();
        tx.set_data::<String>("token", None).unwrap();
        assert_eq!(
            tx.get_data::<String>("token").unwrap_err().code(),
            ReturnCode::NoModuleData
        );
    }

    #[test]
    fn test_type_mismatch() {
        let mock = MockBackend::new();
        let tx = ModuleTransaction::new(&mock);

        tx.set_data("count", Some(1u8)).unwrap();
        let err = tx.get_data::<String>("count").unwrap_err();
        assert_eq!(err.code(), ReturnCode::SystemErr);
        assert!(err.to_string().starts_with("module data 'count' is not a"));
    }

    #[test]
    fn test_failed_install_releases_value() {
        let mock = MockBackend::new().failing(ReturnCode::BufErr);
        let tx = ModuleTransaction::new(&mock);

        let value: Shared = Arc::new(7u64);
        let err = tx.set_data_shared("k", Some(Arc::clone(&value))).unwrap_err();
        assert_eq!(err.code(), ReturnCode::BufErr);
        // Only our reference is left.
        assert_eq!(Arc::strong_count(&value), 1);
    }
}
