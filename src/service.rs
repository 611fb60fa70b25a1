//! One-stop wiring of settings, key manager, field cipher, and token store.

use std::path::Path;
use std::sync::Arc;

use crate::config::Settings;
use crate::errors::Result;
use crate::field::FieldCipher;
use crate::keys::KeyManager;
use crate::store::{DocumentStore, TimeoutStore};
use crate::tokens::TokenStore;

/// The encryption-at-rest services sharing one key manager.
pub struct FieldVault {
    settings: Settings,
    keys: Arc<KeyManager>,
    fields: FieldCipher,
    tokens: TokenStore,
}

impl FieldVault {
    /// Load `.fieldvault.toml` from `dir` and wire everything to `store`.
    ///
    /// Store calls made by the token store are bounded by
    /// `store_timeout_ms`.
    pub fn open<S: DocumentStore + 'static>(dir: &Path, store: Arc<S>) -> Result<Self> {
        let settings = Settings::load(dir)?;
        let keys = Arc::new(KeyManager::from_settings(&settings));
        Ok(Self::with_keys(settings, keys, store))
    }

    /// Wire an explicit key manager, e.g. one built with `KeyManager::with_key`.
    pub fn with_keys<S: DocumentStore + 'static>(
        settings: Settings,
        keys: Arc<KeyManager>,
        store: Arc<S>,
    ) -> Self {
        let bounded: Arc<dyn DocumentStore> =
            Arc::new(TimeoutStore::new(store, settings.store_timeout()));

        let fields = FieldCipher::new(Arc::clone(&keys))
            .with_parallel_threshold(settings.parallel_threshold);
        let tokens = TokenStore::new(bounded, Arc::clone(&keys)).with_settings(&settings);

        Self {
            settings,
            keys,
            fields,
            tokens,
        }
    }

    /// Resolve the master key now rather than on first use.
    ///
    /// In production this surfaces a missing key at startup.
    pub fn ensure_key(&self) -> Result<()> {
        self.keys.get_key().map(|_| ())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn fields(&self) -> &FieldCipher {
        &self.fields
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::store::MemoryStore;
    use crate::tokens::{OAuthToken, ScopeKey};

    #[test]
    fn services_share_one_key_manager() {
        let keys = Arc::new(
            KeyManager::with_key(Environment::Test, "service-unit-test-key-0123456789abcdef")
                .unwrap(),
        );
        let vault = FieldVault::with_keys(Settings::default(), keys, Arc::new(MemoryStore::new()));
        vault.ensure_key().unwrap();

        let stored = vault.fields().encrypt_field("AB123456C").unwrap();
        assert_eq!(vault.fields().decrypt_field(&stored).unwrap(), "AB123456C");

        let scope = ScopeKey::new("acme-co", "hmrc", "sandbox").unwrap();
        let token = OAuthToken::new("tok_abc", "tok_xyz", 3600, chrono::Utc::now()).unwrap();
        vault.tokens().store_token(&scope, &token).unwrap();
        assert_eq!(vault.tokens().get_token(&scope).unwrap(), Some(token));
    }
}
