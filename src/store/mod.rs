//! The document store boundary.
//!
//! FieldVault only needs four primitives against a hierarchical path store:
//! `get`, `set`, `update` (merge top-level fields into an existing
//! document) and `delete`.  Query, transaction, and streaming features of
//! the backing store are never used.
//!
//! This module provides:
//! - The `DocumentStore` trait
//! - An in-memory implementation (`memory`)
//! - A single-file JSON implementation with atomic writes (`file`)
//! - A wrapper that enforces a per-call deadline (`timeout`)

pub mod file;
pub mod memory;
pub mod timeout;

use serde_json::{Map, Value};

use crate::errors::Result;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use timeout::TimeoutStore;

/// A hierarchical key/path document store.
pub trait DocumentStore: Send + Sync {
    /// Read the document at `path`, or `None` if absent.
    fn get(&self, path: &str) -> Result<Option<Value>>;

    /// Create or replace the document at `path`.
    fn set(&self, path: &str, value: Value) -> Result<()>;

    /// Merge `fields` into the existing document at `path`.
    ///
    /// Fails if no document exists there.
    fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()>;

    /// Remove the document at `path`.  Removing a missing path is not an
    /// error.
    fn delete(&self, path: &str) -> Result<()>;

    /// The same store without any per-call deadline, if this one has one.
    ///
    /// A call made through the returned store has either completed or
    /// failed by the time it returns.  Key rotation writes through it so a
    /// failed rotation can be rolled back completely.
    fn unbounded(&self) -> Option<&dyn DocumentStore> {
        None
    }
}

/// Merge `fields` into `doc`, which must be a JSON object.
pub(crate) fn merge_fields(path: &str, doc: &mut Value, fields: Map<String, Value>) -> Result<()> {
    let Some(object) = doc.as_object_mut() else {
        return Err(crate::errors::FieldVaultError::StoreError(format!(
            "document at '{path}' is not an object"
        )));
    };
    for (key, value) in fields {
        object.insert(key, value);
    }
    Ok(())
}
