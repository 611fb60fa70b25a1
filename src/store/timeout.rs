//! Per-call deadlines for a document store.
//!
//! Each call runs on a short-lived worker thread; if it has not answered
//! within the deadline the caller gets `StoreTimeout` and the operation is
//! treated as failed.  The worker is left to finish on its own, so a
//! timed-out `set` may still land: callers must not assume it did or did
//! not.  Callers that need a settled outcome use `unbounded()`.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{Map, Value};

use super::DocumentStore;
use crate::errors::{FieldVaultError, Result};

/// Wraps a store and bounds how long each call may take.
pub struct TimeoutStore<S> {
    inner: Arc<S>,
    timeout: Duration,
}

impl<S: DocumentStore + 'static> TimeoutStore<S> {
    pub fn new(inner: Arc<S>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);

        thread::Builder::new()
            .name("fieldvault-store".into())
            .spawn(move || {
                // The receiver may already be gone after a timeout.
                let _ = tx.send(op(inner.as_ref()));
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(FieldVaultError::StoreTimeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(FieldVaultError::StoreError(
                "store worker exited without a result".into(),
            )),
        }
    }
}

impl<S: DocumentStore + 'static> DocumentStore for TimeoutStore<S> {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        let path = path.to_string();
        self.run(move |s| s.get(&path))
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        let path = path.to_string();
        self.run(move |s| s.set(&path, value))
    }

    fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        let path = path.to_string();
        self.run(move |s| s.update(&path, fields))
    }

    fn delete(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.run(move |s| s.delete(&path))
    }

    fn unbounded(&self) -> Option<&dyn DocumentStore> {
        let inner: &dyn DocumentStore = self.inner.as_ref();
        Some(inner.unbounded().unwrap_or(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    /// A store whose reads never come back in time.
    struct SlowStore;

    impl DocumentStore for SlowStore {
        fn get(&self, _path: &str) -> Result<Option<Value>> {
            thread::sleep(Duration::from_millis(500));
            Ok(None)
        }
        fn set(&self, _path: &str, _value: Value) -> Result<()> {
            Ok(())
        }
        fn update(&self, _path: &str, _fields: Map<String, Value>) -> Result<()> {
            Ok(())
        }
        fn delete(&self, _path: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn fast_calls_pass_through() {
        let store = TimeoutStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(5));
        store.set("k", json!(1)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!(1)));
    }

    #[test]
    fn unbounded_view_skips_the_deadline() {
        let store = TimeoutStore::new(Arc::new(SlowStore), Duration::from_millis(20));
        let direct = store.unbounded().expect("timeout store has an unbounded view");
        assert_eq!(direct.get("k").unwrap(), None);
        assert!(MemoryStore::new().unbounded().is_none());
    }

    #[test]
    fn slow_calls_time_out() {
        let store = TimeoutStore::new(Arc::new(SlowStore), Duration::from_millis(20));
        assert!(matches!(
            store.get("k"),
            Err(FieldVaultError::StoreTimeout(_))
        ));
    }
}
