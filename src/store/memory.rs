use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{merge_fields, DocumentStore};
use crate::errors::{FieldVaultError, Result};

/// A process-local document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        Ok(self.docs.read().get(path).cloned())
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        self.docs.write().insert(path.to_string(), value);
        Ok(())
    }

    fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        let mut docs = self.docs.write();
        let doc = docs
            .get_mut(path)
            .ok_or_else(|| FieldVaultError::StoreError(format!("no document at '{path}'")))?;
        merge_fields(path, doc, fields)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.docs.write().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_get_update_delete() {
        let store = MemoryStore::new();
        assert!(store.get("a/b").unwrap().is_none());

        store.set("a/b", json!({"x": 1, "y": 2})).unwrap();
        let mut patch = Map::new();
        patch.insert("y".into(), json!(3));
        store.update("a/b", patch).unwrap();
        assert_eq!(store.get("a/b").unwrap(), Some(json!({"x": 1, "y": 3})));

        store.delete("a/b").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn update_of_missing_document_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update("missing", Map::new()),
            Err(FieldVaultError::StoreError(_))
        ));
    }
}
