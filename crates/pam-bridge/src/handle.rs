//! Boundary-safe handles
//!
//! Native code can only carry an integer (`void *appdata`, `pam_set_data`
//! payloads) across calls. A [`Handle`] is that integer: a key into a
//! process-wide table owning the real value. Handles are leaked unless
//! released, and release is expected exactly once; a second release finds
//! nothing and is logged.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Values that may live in the handle table
pub type Shared = Arc<dyn Any + Send + Sync>;

static TABLE: Lazy<Mutex<HashMap<usize, Shared>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT: AtomicUsize = AtomicUsize::new(1);

/// Integer token standing in for a value owned by the handle table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroUsize);

impl Handle {
    /// Store `value` and hand out a fresh token
    pub fn new(value: Shared) -> Self {
        let id = loop {
            // Zero means "absent" at the boundary, skip it on wrap-around.
            if let Some(id) = NonZeroUsize::new(NEXT.fetch_add(1, Ordering::Relaxed)) {
                break id;
            }
        };
        TABLE.lock().insert(id.get(), value);
        Self(id)
    }

    /// Reinterpret a raw token; zero is "no handle"
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    pub fn as_raw(self) -> usize {
        self.0.get()
    }

    /// Shared access to the value; the table keeps ownership
    pub fn value(self) -> Option<Shared> {
        TABLE.lock().get(&self.0.get()).cloned()
    }

    /// Typed access to the value
    pub fn downcast<T: Any + Send + Sync>(self) -> Option<Arc<T>> {
        self.value().and_then(|value| value.downcast::<T>().ok())
    }

    /// Drop the table's reference. Returns false if it was already gone.
    pub fn release(self) -> bool {
        // Take the value out first so its destructor never runs under the lock.
        let removed = TABLE.lock().remove(&self.0.get());
        match removed {
            Some(value) => {
                drop(value);
                true
            }
            None => {
                tracing::warn!(handle = self.0.get(), "handle released twice");
                false
            }
        }
    }
}
