//! Encryption and decryption of individual stored field values.
//!
//! `FieldCipher` is the only place that decides what to do with a stored
//! string:
//!
//! | stored value              | on read                                   |
//! |---------------------------|-------------------------------------------|
//! | `ENC:<envelope>`          | decrypt; any failure is returned          |
//! | bare base64, >= 60 chars  | try to decrypt; on failure warn, keep it  |
//! | anything else             | returned unchanged                        |
//!
//! Writing a value that already carries the marker is a no-op.

use std::sync::Arc;

use serde_json::Value;

use super::batch::parallel_map;
use super::classify::{classify, mark, StoredValue};
use super::mapping::{self, FieldSpec};
use crate::crypto::envelope;
use crate::errors::Result;
use crate::keys::KeyManager;

/// Default batch size below which entity lists are processed inline.
const DEFAULT_PARALLEL_THRESHOLD: usize = 32;

/// Field-level encrypt/decrypt bound to a key provider.
#[derive(Clone)]
pub struct FieldCipher {
    keys: Arc<KeyManager>,
    parallel_threshold: usize,
}

impl FieldCipher {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self {
            keys,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Set how many entities a batch needs before it is spread over threads.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    // ------------------------------------------------------------------
    // Single values
    // ------------------------------------------------------------------

    /// Encrypt a plaintext value into a marked ciphertext string.
    ///
    /// Empty and already-marked values are returned unchanged.
    pub fn encrypt_field(&self, value: &str) -> Result<String> {
        if value.is_empty() {
            return Ok(String::new());
        }
        if let StoredValue::Marked(_) = classify(value) {
            return Ok(value.to_string());
        }

        let key = self.keys.get_key()?;
        let envelope = envelope::encrypt(value, key.as_str())?;
        Ok(mark(&envelope))
    }

    /// Recover the plaintext of a stored value.
    pub fn decrypt_field(&self, value: &str) -> Result<String> {
        match classify(value) {
            StoredValue::Plain(plain) => Ok(plain.to_string()),
            StoredValue::Marked(envelope) => {
                let key = self.keys.get_key()?;
                envelope::decrypt(envelope, key.as_str())
            }
            StoredValue::LegacySuspect(candidate) => {
                let key = self.keys.get_key()?;
                match envelope::decrypt(candidate, key.as_str()) {
                    Ok(plain) => Ok(plain),
                    Err(e) => {
                        tracing::warn!(
                            len = candidate.len(),
                            error = %e,
                            "unmarked value looked like legacy ciphertext but did not decrypt; \
                             treating it as plaintext"
                        );
                        Ok(candidate.to_string())
                    }
                }
            }
        }
    }

    /// `true` if the stored value is not yet a marked ciphertext.
    pub fn needs_upgrade(&self, value: &str) -> bool {
        !value.is_empty() && !matches!(classify(value), StoredValue::Marked(_))
    }

    /// Rewrite any stored value (plaintext, legacy envelope, or marked) as
    /// a current marked ciphertext.
    pub fn reencrypt_field(&self, value: &str) -> Result<String> {
        if !self.needs_upgrade(value) {
            return Ok(value.to_string());
        }
        let plain = self.decrypt_field(value)?;
        self.encrypt_field(&plain)
    }

    // ------------------------------------------------------------------
    // Structured values
    // ------------------------------------------------------------------

    /// Serialize a JSON value to its canonical string form and encrypt it.
    pub fn encrypt_json(&self, value: &Value) -> Result<String> {
        let canonical = serde_json::to_string(value)?;
        self.encrypt_field(&canonical)
    }

    /// Decrypt a stored structured value.
    ///
    /// A decrypted value that is not JSON comes back as a JSON string.
    pub fn decrypt_json(&self, stored: &str) -> Result<Value> {
        let plain = self.decrypt_field(stored)?;
        Ok(serde_json::from_str(&plain).unwrap_or(Value::String(plain)))
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Produce the stored form of `entity` for the declared fields.
    pub fn encrypt_entity(&self, entity: &Value, fields: &[FieldSpec<'_>]) -> Result<Value> {
        mapping::encrypt_entity(self, entity, fields)
    }

    /// Recover the logical form of a stored entity.
    pub fn decrypt_entity(&self, stored: &Value, fields: &[FieldSpec<'_>]) -> Result<Value> {
        mapping::decrypt_entity(self, stored, fields)
    }

    /// Encrypt every entity, results in input order.
    ///
    /// Fails with the first error (by position) if any entity fails.
    pub fn encrypt_all(&self, entities: &[Value], fields: &[FieldSpec<'_>]) -> Result<Vec<Value>> {
        parallel_map(entities, self.parallel_threshold, |e| {
            self.encrypt_entity(e, fields)
        })
        .into_iter()
        .collect()
    }

    /// Decrypt every entity, results in input order.
    pub fn decrypt_all(&self, stored: &[Value], fields: &[FieldSpec<'_>]) -> Result<Vec<Value>> {
        parallel_map(stored, self.parallel_threshold, |e| {
            self.decrypt_entity(e, fields)
        })
        .into_iter()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::field::classify::MARKER;
    use serde_json::json;

    const KEY: &str = "field-cipher-unit-test-key-0123456789abcdef";

    fn cipher() -> FieldCipher {
        let keys = KeyManager::with_key(Environment::Test, KEY).unwrap();
        FieldCipher::new(Arc::new(keys))
    }

    #[test]
    fn encrypt_field_marks_and_roundtrips() {
        let c = cipher();
        let stored = c.encrypt_field("AB123456C").unwrap();
        assert!(stored.starts_with(MARKER));
        assert_eq!(c.decrypt_field(&stored).unwrap(), "AB123456C");
    }

    #[test]
    fn encrypt_field_is_idempotent() {
        let c = cipher();
        let once = c.encrypt_field("12-34-56").unwrap();
        let twice = c.encrypt_field(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_values_pass_through() {
        let c = cipher();
        assert_eq!(c.encrypt_field("").unwrap(), "");
        assert_eq!(c.decrypt_field("").unwrap(), "");
        assert!(!c.needs_upgrade(""));
    }

    #[test]
    fn marked_value_with_wrong_key_fails_closed() {
        let stored = cipher().encrypt_field("secret").unwrap();
        let other = KeyManager::with_key(Environment::Test, "another-key-entirely-0123456789-abcdef")
            .unwrap();
        let other = FieldCipher::new(Arc::new(other));
        assert!(other.decrypt_field(&stored).is_err());
    }

    #[test]
    fn json_values_roundtrip() {
        let c = cipher();
        let value = json!({"sortCode": "12-34-56", "accountNumber": "12345678"});
        let stored = c.encrypt_json(&value).unwrap();
        assert_eq!(c.decrypt_json(&stored).unwrap(), value);
    }

    #[test]
    fn reencrypt_upgrades_plaintext_and_keeps_marked() {
        let c = cipher();
        assert!(c.needs_upgrade("plain"));
        let upgraded = c.reencrypt_field("plain").unwrap();
        assert!(!c.needs_upgrade(&upgraded));
        assert_eq!(c.reencrypt_field(&upgraded).unwrap(), upgraded);
        assert_eq!(c.decrypt_field(&upgraded).unwrap(), "plain");
    }
}
