//! Single-file JSON document store for local development.
//!
//! All documents live in one JSON object keyed by path.  Every mutation
//! rewrites the file **atomically**:
//!
//! 1. Serialize the whole document map.
//! 2. Write it to a temp file in the same directory.
//! 3. Rename the temp file over the target path.
//!
//! Readers therefore never see a half-written file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::{merge_fields, DocumentStore};
use crate::errors::{FieldVaultError, Result};

type Documents = BTreeMap<String, Value>;

/// A `DocumentStore` persisted to one JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// The file is only created on the first write.
    pub fn open(path: &Path) -> Result<Self> {
        let store = Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        };
        // Fail early on a corrupt file rather than on first use.
        store.read_all()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Documents> {
        if !self.path.exists() {
            return Ok(Documents::new());
        }
        let data = fs::read(&self.path)?;
        serde_json::from_slice(&data).map_err(|e| {
            FieldVaultError::StoreError(format!(
                "{} is not a valid document file: {e}",
                self.path.display()
            ))
        })
    }

    fn write_all(&self, docs: &Documents) -> Result<()> {
        let buf = serde_json::to_vec_pretty(docs)?;

        let parent = self.path.parent().unwrap_or(Path::new("."));
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        ));

        fs::write(&tmp_path, &buf)?;

        // On Unix, restrict permissions to owner-only read/write.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Documents) -> Result<()>,
    {
        let _guard = self.lock.lock();
        let mut docs = self.read_all()?;
        f(&mut docs)?;
        self.write_all(&docs)
    }
}

impl DocumentStore for JsonFileStore {
    fn get(&self, path: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(path))
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        self.modify(|docs| {
            docs.insert(path.to_string(), value);
            Ok(())
        })
    }

    fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        self.modify(|docs| {
            let doc = docs
                .get_mut(path)
                .ok_or_else(|| FieldVaultError::StoreError(format!("no document at '{path}'")))?;
            merge_fields(path, doc, fields)
        })
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.modify(|docs| {
            docs.remove(path);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn documents_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docs.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("employees/e1", json!({"name": "Ada"})).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("employees/e1").unwrap(),
            Some(json!({"name": "Ada"}))
        );
    }

    #[test]
    fn update_merges_and_delete_removes() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(&dir.path().join("docs.json")).unwrap();

        store.set("t/1", json!({"a": 1})).unwrap();
        let mut patch = Map::new();
        patch.insert("b".into(), json!(2));
        store.update("t/1", patch).unwrap();
        assert_eq!(store.get("t/1").unwrap(), Some(json!({"a": 1, "b": 2})));

        store.delete("t/1").unwrap();
        assert_eq!(store.get("t/1").unwrap(), None);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(&dir.path().join("docs.json")).unwrap();
        store.set("k", json!(true)).unwrap();
        assert!(!dir.path().join(".docs.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_rejected_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docs.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(FieldVaultError::StoreError(_))
        ));
    }
}
