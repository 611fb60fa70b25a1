//! Resolution and caching of the master encryption key.
//!
//! `KeyManager::get_key` returns the cached key when there is one;
//! otherwise it walks the configured sources in order, asking each for
//! each key name in order, and takes the first non-empty value.  That value
//! is validated and cached until `clear_cache` or `replace_key`.
//!
//! Production refuses to continue without a valid key.  Every other
//! environment logs a warning and uses `FALLBACK_KEY` so local work is not
//! blocked.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{Environment, Settings};
use crate::errors::{FieldVaultError, Result};

use super::master::MasterKey;
use super::source::{ConfigSource, EnvSource};

/// Minimum accepted key length, in characters.
pub const MIN_KEY_LEN: usize = 32;

/// Publicly known key used outside production when nothing valid is
/// configured.  Anything encrypted with it is effectively plaintext.
pub const FALLBACK_KEY: &str = "fieldvault-development-fallback-key-not-for-real-data";

/// Outcome of `validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValidation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl KeyValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Check a candidate master key.
///
/// Rejects a missing key, one shorter than `MIN_KEY_LEN` characters, and
/// one made of a single repeated character.
pub fn validate(candidate: Option<&str>) -> KeyValidation {
    let Some(key) = candidate else {
        return KeyValidation::rejected("encryption key is not set");
    };

    let len = key.chars().count();
    if len == 0 {
        return KeyValidation::rejected("encryption key is empty");
    }
    if len < MIN_KEY_LEN {
        return KeyValidation::rejected(format!(
            "encryption key must be at least {MIN_KEY_LEN} characters (got {len})"
        ));
    }

    let mut chars = key.chars();
    if let Some(first) = chars.next() {
        if chars.all(|c| c == first) {
            return KeyValidation::rejected("encryption key is a single repeated character");
        }
    }

    KeyValidation::ok()
}

/// Where the cached key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResolution {
    /// Found in a configuration source under `name`.
    Source { source: String, name: String },
    /// Supplied directly (`with_key` or `replace_key`).
    Injected,
    /// Nothing valid was configured; `FALLBACK_KEY` is in use.
    Fallback { reason: String },
}

struct CachedKey {
    key: Arc<MasterKey>,
    resolution: KeyResolution,
}

/// Resolves, validates, and caches the master key.
///
/// Share one instance behind an `Arc`; all methods take `&self`.
pub struct KeyManager {
    environment: Environment,
    key_names: Vec<String>,
    sources: Vec<Box<dyn ConfigSource>>,
    cache: RwLock<Option<CachedKey>>,
    /// Held exclusively while data is being moved to a new key.
    rotation: RwLock<()>,
}

impl KeyManager {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Build a manager over explicit sources and key names.
    pub fn new(
        environment: Environment,
        key_names: Vec<String>,
        sources: Vec<Box<dyn ConfigSource>>,
    ) -> Self {
        Self {
            environment,
            key_names,
            sources,
            cache: RwLock::new(None),
            rotation: RwLock::new(()),
        }
    }

    /// Build a manager from settings, reading the process environment and,
    /// with the `keyring-store` feature, the OS keyring.
    pub fn from_settings(settings: &Settings) -> Self {
        #[allow(unused_mut)]
        let mut sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(EnvSource)];

        #[cfg(feature = "keyring-store")]
        sources.push(Box::new(super::keyring::KeyringSource));

        Self::new(settings.environment, settings.key_names.clone(), sources)
    }

    /// Build a manager pre-loaded with `key`.
    ///
    /// Fails with `ConfigurationError` if the key does not validate.
    pub fn with_key(environment: Environment, key: &str) -> Result<Self> {
        let manager = Self::new(environment, Vec::new(), Vec::new());
        manager.replace_key(key)?;
        Ok(manager)
    }

    // ------------------------------------------------------------------
    // Key access
    // ------------------------------------------------------------------

    /// Return the master key, resolving and caching it on first use.
    ///
    /// Concurrent first calls may each resolve and validate the key; the
    /// first one to store it wins and the others return the stored value.
    pub fn get_key(&self) -> Result<Arc<MasterKey>> {
        if let Some(cached) = self.cache.read().as_ref() {
            return Ok(Arc::clone(&cached.key));
        }

        let resolved = self.resolve()?;

        let mut cache = self.cache.write();
        let entry = cache.get_or_insert(resolved);
        Ok(Arc::clone(&entry.key))
    }

    /// How the currently cached key was obtained, if one is cached.
    pub fn resolution(&self) -> Option<KeyResolution> {
        self.cache.read().as_ref().map(|c| c.resolution.clone())
    }

    /// Drop the cached key so the next `get_key` resolves again.
    pub fn clear_cache(&self) {
        *self.cache.write() = None;
    }

    /// Validate `key` and make it the cached key.
    ///
    /// Used at the end of a rotation, once every record has been rewritten.
    pub fn replace_key(&self, key: &str) -> Result<()> {
        let check = validate(Some(key));
        if !check.valid {
            return Err(FieldVaultError::ConfigurationError(
                check.reason.unwrap_or_else(|| "invalid encryption key".into()),
            ));
        }

        *self.cache.write() = Some(CachedKey {
            key: Arc::new(MasterKey::new(key)),
            resolution: KeyResolution::Injected,
        });
        Ok(())
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Shared guard for work that must not overlap a key rotation.
    ///
    /// Not reentrant: do not take it twice on one thread.
    pub(crate) fn rotation_shared(&self) -> RwLockReadGuard<'_, ()> {
        self.rotation.read()
    }

    /// Exclusive guard held for the whole of a key rotation.
    pub(crate) fn rotation_exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.rotation.write()
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// First non-empty value across sources (outer) and names (inner).
    fn lookup(&self) -> Option<(String, KeyResolution)> {
        for source in &self.sources {
            for name in &self.key_names {
                if let Some(value) = source.lookup(name).filter(|v| !v.is_empty()) {
                    tracing::debug!(source = source.name(), name = %name, "resolved encryption key");
                    let resolution = KeyResolution::Source {
                        source: source.name().to_string(),
                        name: name.clone(),
                    };
                    return Some((value, resolution));
                }
            }
        }
        None
    }

    fn resolve(&self) -> Result<CachedKey> {
        let found = self.lookup();
        let check = validate(found.as_ref().map(|(value, _)| value.as_str()));

        if let (true, Some((value, resolution))) = (check.valid, found) {
            return Ok(CachedKey {
                key: Arc::new(MasterKey::new(value)),
                resolution,
            });
        }

        let reason = check
            .reason
            .unwrap_or_else(|| "invalid encryption key".to_string());

        if self.environment.is_production() {
            return Err(FieldVaultError::ConfigurationError(format!(
                "no valid encryption key in production: {reason} (checked {})",
                self.key_names.join(", ")
            )));
        }

        tracing::warn!(
            environment = %self.environment,
            reason = %reason,
            "no valid encryption key configured; using the public development fallback key, \
             do not store real data"
        );

        Ok(CachedKey {
            key: Arc::new(MasterKey::new(FALLBACK_KEY)),
            resolution: KeyResolution::Fallback { reason },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::source::MapSource;

    const GOOD_KEY: &str = "0123456789abcdef0123456789abcdef-unit";

    fn manager(env: Environment, source: MapSource) -> KeyManager {
        KeyManager::new(
            env,
            vec!["PRIMARY".into(), "SECONDARY".into()],
            vec![Box::new(source)],
        )
    }

    #[test]
    fn validate_rejects_missing_short_and_repeated_keys() {
        assert!(!validate(None).valid);
        assert!(!validate(Some("")).valid);
        assert!(!validate(Some("too-short")).valid);
        assert!(!validate(Some("a".repeat(64).as_str())).valid);
        assert!(validate(Some(GOOD_KEY)).valid);
    }

    #[test]
    fn validate_reports_a_reason() {
        let check = validate(Some("short"));
        assert!(check.reason.unwrap().contains("at least 32"));
        assert_eq!(validate(Some(GOOD_KEY)).reason, None);
    }

    #[test]
    fn fallback_key_is_itself_valid() {
        assert!(validate(Some(FALLBACK_KEY)).valid);
    }

    #[test]
    fn first_non_empty_name_wins() {
        let source = MapSource::new("map")
            .with("PRIMARY", "")
            .with("SECONDARY", GOOD_KEY);
        let km = manager(Environment::Production, source);
        assert_eq!(km.get_key().unwrap().as_str(), GOOD_KEY);
        assert_eq!(
            km.resolution(),
            Some(KeyResolution::Source {
                source: "map".into(),
                name: "SECONDARY".into()
            })
        );
    }

    #[test]
    fn production_without_key_is_a_configuration_error() {
        let km = manager(Environment::Production, MapSource::new("map"));
        assert!(matches!(
            km.get_key(),
            Err(FieldVaultError::ConfigurationError(_))
        ));
        assert_eq!(km.resolution(), None);
    }

    #[test]
    fn development_without_key_uses_fallback() {
        let km = manager(Environment::Development, MapSource::new("map"));
        assert_eq!(km.get_key().unwrap().as_str(), FALLBACK_KEY);
        assert!(matches!(
            km.resolution(),
            Some(KeyResolution::Fallback { .. })
        ));
    }

    #[test]
    fn invalid_key_falls_back_outside_production() {
        let source = MapSource::new("map").with("PRIMARY", "short");
        let km = manager(Environment::Test, source);
        assert_eq!(km.get_key().unwrap().as_str(), FALLBACK_KEY);
    }

    #[test]
    fn clear_cache_forces_reresolution() {
        let km = KeyManager::with_key(Environment::Production, GOOD_KEY).unwrap();
        assert_eq!(km.get_key().unwrap().as_str(), GOOD_KEY);

        km.clear_cache();
        // No sources: production now has nothing to resolve.
        assert!(km.get_key().is_err());
    }

    #[test]
    fn replace_key_rejects_invalid_keys() {
        let km = KeyManager::with_key(Environment::Development, GOOD_KEY).unwrap();
        assert!(km.replace_key("short").is_err());
        assert_eq!(km.get_key().unwrap().as_str(), GOOD_KEY);
    }
}
