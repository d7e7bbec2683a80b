use std::sync::{Arc, Mutex};

use crate::error::ServiceError;

/// Load-once slot for the model runtime. The model is loaded exactly
/// once at startup; a load failure leaves the slot empty so a retry
/// can attempt the load again instead of caching the error.
pub struct Startup<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> Startup<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Returns the already-loaded value, or runs `load` and caches the
    /// result. Concurrent callers serialize on the slot, so `load`
    /// never runs twice for a successful initialization.
    pub fn initialize_with<F>(&self, load: F) -> Result<Arc<T>, ServiceError>
    where
        F: FnOnce() -> Result<T, ServiceError>,
    {
        let mut slot = self.slot.lock().unwrap();
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }

        let value = Arc::new(load()?);
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }
}

impl<T> Default for Startup<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initializes_once() {
        let startup = Startup::new();
        let mut calls = 0;

        let first = startup
            .initialize_with(|| {
                calls += 1;
                Ok(42u32)
            })
            .unwrap();

        let second = startup
            .initialize_with(|| {
                calls += 1;
                Ok(7u32)
            })
            .unwrap();

        assert_eq!(*first, 42);
        assert_eq!(*second, 42);
        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let startup = Startup::new();

        let failed: Result<Arc<u32>, _> =
            startup.initialize_with(|| Err(ServiceError::Config("boom".to_string())));
        assert!(failed.is_err());

        // The slot stays empty, so a later attempt can succeed.
        let recovered = startup.initialize_with(|| Ok(11u32)).unwrap();
        assert_eq!(*recovered, 11);
    }
}
