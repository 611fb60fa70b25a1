//! Declarative mapping from logical entity fields to stored fields.
//!
//! Each entity type declares a table of `FieldSpec`s.  A spec names the
//! logical path (what callers see), the storage path (what is persisted),
//! and how the value is encrypted.  Paths are dot-separated and walk
//! nested JSON objects (`"hmrc.accessToken"`).
//!
//! Text fields are encrypted in place.  JSON fields are serialized,
//! encrypted, written under the storage path, and the logical field is
//! removed, e.g. `bankDetails` becomes `bankDetailsEncrypted`.  Decryption
//! applies the same table in reverse.

use serde_json::{Map, Value};

use super::cipher::FieldCipher;
use crate::errors::{FieldVaultError, Result};

/// How a field's value is turned into a stored string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A string (numbers and booleans are stringified).
    Text,
    /// Any JSON value, stored as its canonical serialization.
    Json,
}

/// One sensitive field of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec<'a> {
    pub logical: &'a str,
    pub storage: &'a str,
    pub kind: FieldKind,
}

impl<'a> FieldSpec<'a> {
    /// A text field encrypted in place.
    pub const fn text(path: &'a str) -> Self {
        Self {
            logical: path,
            storage: path,
            kind: FieldKind::Text,
        }
    }

    /// A structured field relocated to `storage` once encrypted.
    pub const fn json(logical: &'a str, storage: &'a str) -> Self {
        Self {
            logical,
            storage,
            kind: FieldKind::Json,
        }
    }

    fn relocates(&self) -> bool {
        self.logical != self.storage
    }
}

/// Build in-place text specs for a list of paths.
pub fn text_fields<'a>(paths: &[&'a str]) -> Vec<FieldSpec<'a>> {
    paths.iter().copied().map(FieldSpec::text).collect()
}

// ---------------------------------------------------------------------------
// Entity transforms
// ---------------------------------------------------------------------------

pub(crate) fn encrypt_entity(
    cipher: &FieldCipher,
    entity: &Value,
    fields: &[FieldSpec<'_>],
) -> Result<Value> {
    ensure_object(entity)?;
    let mut out = entity.clone();

    for spec in fields {
        let Some(current) = get_path(&out, spec.logical) else {
            continue;
        };

        let stored = match (spec.kind, current) {
            (_, Value::Null) => continue,
            (FieldKind::Text, Value::String(s)) if s.is_empty() => continue,
            (FieldKind::Text, Value::String(s)) => cipher.encrypt_field(s)?,
            (FieldKind::Text, Value::Number(n)) => cipher.encrypt_field(&n.to_string())?,
            (FieldKind::Text, Value::Bool(b)) => cipher.encrypt_field(&b.to_string())?,
            (FieldKind::Text, _) => {
                return Err(FieldVaultError::InvalidInput(format!(
                    "field '{}' is declared as text but holds a structured value",
                    spec.logical
                )))
            }
            (FieldKind::Json, value) => cipher.encrypt_json(value)?,
        };

        if spec.relocates() {
            remove_path(&mut out, spec.logical);
        }
        set_path(&mut out, spec.storage, Value::String(stored))?;
    }

    Ok(out)
}

pub(crate) fn decrypt_entity(
    cipher: &FieldCipher,
    stored: &Value,
    fields: &[FieldSpec<'_>],
) -> Result<Value> {
    ensure_object(stored)?;
    let mut out = stored.clone();

    for spec in fields {
        let Some(Value::String(raw)) = get_path(&out, spec.storage) else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }

        let logical = match spec.kind {
            FieldKind::Text => Value::String(cipher.decrypt_field(raw)?),
            FieldKind::Json => cipher.decrypt_json(raw)?,
        };

        if spec.relocates() {
            remove_path(&mut out, spec.storage);
        }
        set_path(&mut out, spec.logical, logical)?;
    }

    Ok(out)
}

fn ensure_object(value: &Value) -> Result<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(FieldVaultError::InvalidInput(
            "entity must be a JSON object".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Dotted-path helpers
// ---------------------------------------------------------------------------

fn get_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |node, segment| node.get(segment))
}

fn remove_path(value: &mut Value, path: &str) -> Option<Value> {
    let (parent, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (get_path_mut(value, parent)?, leaf),
        None => (value, path),
    };
    parent.as_object_mut()?.remove(leaf)
}

fn get_path_mut<'v>(value: &'v mut Value, path: &str) -> Option<&'v mut Value> {
    path.split('.')
        .try_fold(value, |node, segment| node.get_mut(segment))
}

/// Write `new` at `path`, creating intermediate objects as needed.
fn set_path(value: &mut Value, path: &str, new: Value) -> Result<()> {
    let mut node = value;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let object = node.as_object_mut().ok_or_else(|| {
            FieldVaultError::InvalidInput(format!(
                "cannot set '{path}': '{segment}' is not inside an object"
            ))
        })?;

        if segments.peek().is_none() {
            object.insert(segment.to_string(), new);
            return Ok(());
        }

        node = object
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::field::classify::is_marked;
    use crate::keys::KeyManager;
    use serde_json::json;
    use std::sync::Arc;

    const KEY: &str = "mapping-unit-test-key-0123456789abcdefghij";

    fn cipher() -> FieldCipher {
        FieldCipher::new(Arc::new(
            KeyManager::with_key(Environment::Test, KEY).unwrap(),
        ))
    }

    #[test]
    fn path_helpers_walk_nested_objects() {
        let mut doc = json!({"a": {"b": {"c": 1}}});
        assert_eq!(get_path(&doc, "a.b.c"), Some(&json!(1)));
        assert_eq!(get_path(&doc, "a.x"), None);

        set_path(&mut doc, "a.d.e", json!("new")).unwrap();
        assert_eq!(doc["a"]["d"]["e"], json!("new"));

        assert_eq!(remove_path(&mut doc, "a.b.c"), Some(json!(1)));
        assert_eq!(doc["a"]["b"], json!({}));
    }

    #[test]
    fn set_path_refuses_to_descend_into_scalars() {
        let mut doc = json!({"a": 5});
        assert!(set_path(&mut doc, "a.b", json!(1)).is_err());
    }

    #[test]
    fn json_field_is_relocated_and_restored() {
        let c = cipher();
        let spec = [FieldSpec::json("bank", "bankEncrypted")];
        let entity = json!({"id": 1, "bank": {"sortCode": "12-34-56"}});

        let stored = encrypt_entity(&c, &entity, &spec).unwrap();
        assert!(stored.get("bank").is_none());
        assert!(is_marked(stored["bankEncrypted"].as_str().unwrap()));

        let restored = decrypt_entity(&c, &stored, &spec).unwrap();
        assert_eq!(restored, entity);
    }

    #[test]
    fn numbers_in_text_fields_are_stringified() {
        let c = cipher();
        let spec = [FieldSpec::text("salary")];
        let stored = encrypt_entity(&c, &json!({"salary": 42000}), &spec).unwrap();
        let restored = decrypt_entity(&c, &stored, &spec).unwrap();
        assert_eq!(restored["salary"], json!("42000"));
    }

    #[test]
    fn structured_value_in_text_field_is_rejected() {
        let c = cipher();
        let spec = [FieldSpec::text("notes")];
        let result = encrypt_entity(&c, &json!({"notes": {"a": 1}}), &spec);
        assert!(matches!(result, Err(FieldVaultError::InvalidInput(_))));
    }

    #[test]
    fn missing_and_null_fields_are_left_alone() {
        let c = cipher();
        let spec = text_fields(&["niNumber", "taxCode"]);
        let entity = json!({"niNumber": null});
        assert_eq!(encrypt_entity(&c, &entity, &spec).unwrap(), entity);
    }

    #[test]
    fn non_object_entities_are_rejected() {
        let c = cipher();
        assert!(encrypt_entity(&c, &json!([1, 2]), &[]).is_err());
    }
}
