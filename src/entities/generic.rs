//! Encryption of caller-chosen fields on an arbitrary JSON object.

use serde_json::Value;

use crate::errors::Result;
use crate::field::{text_fields, FieldCipher};

/// Encrypt the named text fields of `object` in place.
///
/// Paths may be dotted.  Missing, null, and already-marked fields are left
/// as they are.
pub fn encrypt_sensitive_fields(cipher: &FieldCipher, object: &Value, fields: &[&str]) -> Result<Value> {
    cipher.encrypt_entity(object, &text_fields(fields))
}

/// Decrypt the named text fields of `object`, tolerating legacy plaintext.
pub fn decrypt_sensitive_fields(cipher: &FieldCipher, object: &Value, fields: &[&str]) -> Result<Value> {
    cipher.decrypt_entity(object, &text_fields(fields))
}
