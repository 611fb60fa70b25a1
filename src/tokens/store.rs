//! Encrypted OAuth token storage on top of a `DocumentStore`.
//!
//! Records live at `secure_tokens/<tenant>:<provider>:<environment>`.
//! Both tokens are always stored as marked ciphertext; expiry, scope, and
//! timestamps stay plaintext so `get_token_metadata` never touches the key.
//!
//! The store boundary has no query support, so each tenant also has an
//! index document at `secure_tokens_index/<tenant>` listing its record
//! keys.  Key rotation walks that index.
//!
//! Every operation that uses the key takes the key manager's rotation
//! guard, so no read or write of a record interleaves with a rotation.
//! Token stores sharing one `KeyManager` are serialized against each
//! other's rotations.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::{
    validate_component, OAuthToken, RecordMetadata, ScopeKey, TokenMetadata, TokenRecord,
};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::crypto::envelope;
use crate::errors::{FieldVaultError, Result};
use crate::field::batch::parallel_map;
use crate::field::classify::{mark, strip_marker};
use crate::keys::{validate, KeyManager};
use crate::store::DocumentStore;

/// Collection holding token records.
const RECORDS: &str = "secure_tokens";

/// Collection holding per-tenant record indexes.
const INDEXES: &str = "secure_tokens_index";

/// Default window before expiry in which a token should be refreshed.
const DEFAULT_REFRESH_BUFFER_SECS: i64 = 300;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TenantIndex {
    #[serde(default)]
    keys: Vec<String>,
}

/// A record re-encrypted under the new key, plus what to restore on failure.
struct Rewrite {
    path: String,
    original: Value,
    rotated: Value,
}

/// Keyed store for encrypted OAuth credential pairs.
pub struct TokenStore {
    store: Arc<dyn DocumentStore>,
    keys: Arc<KeyManager>,
    clock: Arc<dyn Clock>,
    refresh_buffer: Duration,
    parallel_threshold: usize,
    /// Serializes index read-modify-write cycles within this process.
    index_lock: Mutex<()>,
}

impl TokenStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    pub fn new(store: Arc<dyn DocumentStore>, keys: Arc<KeyManager>) -> Self {
        Self {
            store,
            keys,
            clock: Arc::new(SystemClock),
            refresh_buffer: Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS),
            parallel_threshold: Settings::default().parallel_threshold,
            index_lock: Mutex::new(()),
        }
    }

    /// Apply the refresh buffer and batch threshold from settings.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.refresh_buffer = settings.refresh_buffer();
        self.parallel_threshold = settings.parallel_threshold;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    // ------------------------------------------------------------------
    // Token operations
    // ------------------------------------------------------------------

    /// Encrypt both tokens and write a complete record for `scope`.
    ///
    /// Replaces any existing record, creation time included.
    pub fn store_token(&self, scope: &ScopeKey, token: &OAuthToken) -> Result<()> {
        let _rotation = self.keys.rotation_shared();
        self.write_record(scope, token)
    }

    fn write_record(&self, scope: &ScopeKey, token: &OAuthToken) -> Result<()> {
        let key = self.keys.get_key()?;
        let now = self.clock.now();

        let record = TokenRecord {
            encrypted_access_token: seal(&token.access_token, key.as_str())?,
            encrypted_refresh_token: seal(&token.refresh_token, key.as_str())?,
            expires_at: token.expires_at,
            scope: token.scope.clone(),
            token_type: token.token_type.clone(),
            tenant_id: scope.tenant_id.clone(),
            provider: scope.provider.clone(),
            environment: scope.environment.clone(),
            created_at: now,
            updated_at: now,
            last_refreshed: None,
        };

        self.store
            .set(&record_path(scope), serde_json::to_value(&record)?)?;
        self.add_to_index(scope)
    }

    /// Read and decrypt the token for `scope`, or `None` if there is none.
    ///
    /// A record whose ciphertext does not open is an error, never a token.
    pub fn get_token(&self, scope: &ScopeKey) -> Result<Option<OAuthToken>> {
        let _rotation = self.keys.rotation_shared();
        let Some(doc) = self.store.get(&record_path(scope))? else {
            return Ok(None);
        };
        let record: TokenRecord = serde_json::from_value(doc)?;
        let key = self.keys.get_key()?;

        Ok(Some(OAuthToken {
            access_token: unseal(&record.encrypted_access_token, key.as_str())?,
            refresh_token: unseal(&record.encrypted_refresh_token, key.as_str())?,
            expires_at: record.expires_at,
            scope: record.scope,
            token_type: record.token_type,
        }))
    }

    /// Expiry and refresh flags for `scope`, computed without decrypting.
    pub fn get_token_metadata(&self, scope: &ScopeKey) -> Result<Option<TokenMetadata>> {
        let Some(doc) = self.store.get(&record_path(scope))? else {
            return Ok(None);
        };
        let meta: RecordMetadata = serde_json::from_value(doc)?;
        Ok(Some(meta.evaluate(self.clock.now(), self.refresh_buffer)))
    }

    /// Replace the tokens for `scope` after a refresh.
    ///
    /// Falls back to `store_token` when no record exists.  Otherwise only
    /// the token, expiry, and timestamp fields are overwritten; creation
    /// metadata is kept and `updatedAt` never moves backwards.
    pub fn update_token(&self, scope: &ScopeKey, token: &OAuthToken) -> Result<()> {
        let _rotation = self.keys.rotation_shared();
        let path = record_path(scope);
        let Some(doc) = self.store.get(&path)? else {
            return self.write_record(scope, token);
        };
        let existing: RecordMetadata = serde_json::from_value(doc)?;

        let key = self.keys.get_key()?;
        let now = self.clock.now().max(existing.updated_at);

        let mut fields = Map::new();
        fields.insert(
            "encryptedAccessToken".into(),
            Value::String(seal(&token.access_token, key.as_str())?),
        );
        fields.insert(
            "encryptedRefreshToken".into(),
            Value::String(seal(&token.refresh_token, key.as_str())?),
        );
        fields.insert("expiresAt".into(), serde_json::to_value(token.expires_at)?);
        fields.insert(
            "scope".into(),
            token.scope.clone().map_or(Value::Null, Value::String),
        );
        fields.insert("tokenType".into(), Value::String(token.token_type.clone()));
        fields.insert("updatedAt".into(), serde_json::to_value(now)?);
        fields.insert("lastRefreshed".into(), serde_json::to_value(now)?);

        self.store.update(&path, fields)
    }

    /// Delete the record for `scope`.  Returns `false` if there was none.
    pub fn revoke_token(&self, scope: &ScopeKey) -> Result<bool> {
        let _rotation = self.keys.rotation_shared();
        let path = record_path(scope);
        let existed = self.store.get(&path)?.is_some();
        self.store.delete(&path)?;
        self.remove_from_index(scope)?;
        Ok(existed)
    }

    /// All scopes recorded for `tenant_id`.
    pub fn list_scopes(&self, tenant_id: &str) -> Result<Vec<ScopeKey>> {
        validate_component("tenant id", tenant_id)?;
        self.read_index(tenant_id)?
            .keys
            .iter()
            .map(|k| ScopeKey::parse(k))
            .collect()
    }

    // ------------------------------------------------------------------
    // Key rotation
    // ------------------------------------------------------------------

    /// Re-encrypt every token record of `tenant_id` under `new_key`.
    ///
    /// Every record is opened with a snapshot of the current key before
    /// anything is written, so a record that cannot be read aborts the
    /// rotation untouched.  Writes bypass any store deadline; if one fails,
    /// every record written so far, the failing one included, is restored.
    /// The key manager switches to `new_key` only after all writes
    /// succeed.  Other token operations on the same key manager wait until
    /// the rotation finishes.  Returns the number of records rotated.
    ///
    /// The key is process-wide, not per tenant.  Once this returns `Ok`,
    /// every user of the shared `KeyManager` encrypts and decrypts with
    /// `new_key`, so token records of other tenants and entity fields still
    /// sealed under the old key no longer decrypt.  Rotate every tenant, and
    /// re-encrypt entity fields, as part of the same key change.
    pub fn rotate_encryption_key(&self, tenant_id: &str, new_key: &str) -> Result<usize> {
        validate_component("tenant id", tenant_id)?;
        let check = validate(Some(new_key));
        if !check.valid {
            return Err(FieldVaultError::ConfigurationError(format!(
                "cannot rotate to new key: {}",
                check.reason.unwrap_or_default()
            )));
        }

        let _rotation = self.keys.rotation_exclusive();
        let old_key = self.keys.get_key()?;
        let scopes = self.list_scopes(tenant_id)?;
        let now = self.clock.now();

        // Phase 1: read everything with the old key.
        let rewrites: Vec<Rewrite> = parallel_map(&scopes, self.parallel_threshold, |scope| {
            self.reencrypt_record(scope, old_key.as_str(), new_key, now)
        })
        .into_iter()
        .collect::<Result<Vec<Option<Rewrite>>>>()?
        .into_iter()
        .flatten()
        .collect();

        // Phase 2: write, rolling back on the first failure.  The failing
        // record is restored too, since a failed write may have landed.
        let writer = self.settled_store();
        for (index, rewrite) in rewrites.iter().enumerate() {
            if let Err(e) = writer.set(&rewrite.path, rewrite.rotated.clone()) {
                tracing::error!(
                    tenant = tenant_id,
                    failed_path = %rewrite.path,
                    restoring = index + 1,
                    error = %e,
                    "key rotation write failed; restoring rotated records"
                );
                self.restore(writer, &rewrites[..=index]);
                return Err(e);
            }
        }

        // Phase 3: only now do new encryptions use the new key.
        self.keys.replace_key(new_key)?;

        tracing::info!(tenant = tenant_id, rotated = rewrites.len(), "rotated token encryption key");
        Ok(rewrites.len())
    }

    fn reencrypt_record(
        &self,
        scope: &ScopeKey,
        old_key: &str,
        new_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Rewrite>> {
        let path = record_path(scope);
        let Some(original) = self.store.get(&path)? else {
            tracing::debug!(path = %path, "indexed token record is missing; skipping");
            return Ok(None);
        };

        let mut record: TokenRecord = serde_json::from_value(original.clone())?;
        let access = unseal(&record.encrypted_access_token, old_key)?;
        let refresh = unseal(&record.encrypted_refresh_token, old_key)?;

        record.encrypted_access_token = seal(&access, new_key)?;
        record.encrypted_refresh_token = seal(&refresh, new_key)?;
        record.updated_at = now.max(record.updated_at);

        Ok(Some(Rewrite {
            path,
            original,
            rotated: serde_json::to_value(&record)?,
        }))
    }

    /// The backing store with any per-call deadline removed.
    fn settled_store(&self) -> &dyn DocumentStore {
        self.store.unbounded().unwrap_or(self.store.as_ref())
    }

    fn restore(&self, writer: &dyn DocumentStore, written: &[Rewrite]) {
        for rewrite in written {
            if let Err(e) = writer.set(&rewrite.path, rewrite.original.clone()) {
                tracing::error!(path = %rewrite.path, error = %e, "failed to restore token record");
            }
        }
    }

    // ------------------------------------------------------------------
    // Tenant index
    // ------------------------------------------------------------------

    fn read_index(&self, tenant_id: &str) -> Result<TenantIndex> {
        match self.store.get(&index_path(tenant_id))? {
            Some(doc) => Ok(serde_json::from_value(doc)?),
            None => Ok(TenantIndex::default()),
        }
    }

    fn add_to_index(&self, scope: &ScopeKey) -> Result<()> {
        let _guard = self.index_lock.lock();
        let mut index = self.read_index(&scope.tenant_id)?;
        let key = scope.storage_key();
        if index.keys.contains(&key) {
            return Ok(());
        }
        index.keys.push(key);
        self.store
            .set(&index_path(&scope.tenant_id), serde_json::to_value(&index)?)
    }

    fn remove_from_index(&self, scope: &ScopeKey) -> Result<()> {
        let _guard = self.index_lock.lock();
        let mut index = self.read_index(&scope.tenant_id)?;
        let key = scope.storage_key();
        let before = index.keys.len();
        index.keys.retain(|k| k != &key);
        if index.keys.len() == before {
            return Ok(());
        }
        self.store
            .set(&index_path(&scope.tenant_id), serde_json::to_value(&index)?)
    }
}

fn record_path(scope: &ScopeKey) -> String {
    format!("{RECORDS}/{}", scope.storage_key())
}

fn index_path(tenant_id: &str) -> String {
    format!("{INDEXES}/{tenant_id}")
}

/// Encrypt a token as a marked envelope.  Empty tokens stay empty.
fn seal(token: &str, key: &str) -> Result<String> {
    if token.is_empty() {
        return Ok(String::new());
    }
    Ok(mark(&envelope::encrypt(token, key)?))
}

/// Decrypt a stored token, with or without the marker.
fn unseal(stored: &str, key: &str) -> Result<String> {
    let envelope = strip_marker(stored);
    if envelope.is_empty() {
        return Ok(String::new());
    }
    envelope::decrypt(envelope, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "token-store-unit-test-key-0123456789abcdef";

    #[test]
    fn seal_marks_and_unseal_accepts_bare_envelopes() {
        let sealed = seal("tok_abc", KEY).unwrap();
        assert!(sealed.starts_with("ENC:"));
        assert_eq!(unseal(&sealed, KEY).unwrap(), "tok_abc");
        assert_eq!(unseal(strip_marker(&sealed), KEY).unwrap(), "tok_abc");
    }

    #[test]
    fn empty_tokens_stay_empty() {
        assert_eq!(seal("", KEY).unwrap(), "");
        assert_eq!(unseal("", KEY).unwrap(), "");
    }

    #[test]
    fn paths_use_the_scope_key() {
        let scope = ScopeKey::new("acme-co", "hmrc", "sandbox").unwrap();
        assert_eq!(record_path(&scope), "secure_tokens/acme-co:hmrc:sandbox");
        assert_eq!(index_path("acme-co"), "secure_tokens_index/acme-co");
    }
}
