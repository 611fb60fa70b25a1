//! OS keyring as a master key source.
//!
//! Looks the key up in the operating system's secure credential store:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring / KDE Wallet)
//!
//! Lookups fail soft: an unavailable keyring or a missing entry reads as
//! "not set" so the next source is consulted.

use crate::errors::{FieldVaultError, Result};

use super::source::ConfigSource;

/// Service name used in the OS keyring.
const SERVICE_NAME: &str = "fieldvault";

/// Reads key names as keyring entries under the `fieldvault` service.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringSource;

impl ConfigSource for KeyringSource {
    fn name(&self) -> &str {
        "keyring"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match get_key(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(entry = key, error = %e, "keyring lookup failed");
                None
            }
        }
    }
}

/// Store a master key in the OS keyring under `key_name`.
pub fn store_key(key_name: &str, secret: &str) -> Result<()> {
    let entry = keyring::Entry::new(SERVICE_NAME, key_name).map_err(|e| {
        FieldVaultError::ConfigurationError(format!("failed to create keyring entry: {e}"))
    })?;

    entry.set_password(secret).map_err(|e| {
        FieldVaultError::ConfigurationError(format!("failed to store key in keyring: {e}"))
    })
}

/// Retrieve a master key from the OS keyring.
///
/// Returns `None` if no entry exists (rather than an error).
pub fn get_key(key_name: &str) -> Result<Option<String>> {
    let entry = keyring::Entry::new(SERVICE_NAME, key_name).map_err(|e| {
        FieldVaultError::ConfigurationError(format!("failed to create keyring entry: {e}"))
    })?;

    match entry.get_password() {
        Ok(secret) => Ok(Some(secret)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(FieldVaultError::ConfigurationError(format!(
            "failed to read from keyring: {e}"
        ))),
    }
}

/// Delete a stored master key from the OS keyring.
pub fn delete_key(key_name: &str) -> Result<()> {
    let entry = keyring::Entry::new(SERVICE_NAME, key_name).map_err(|e| {
        FieldVaultError::ConfigurationError(format!("failed to create keyring entry: {e}"))
    })?;

    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(FieldVaultError::ConfigurationError(format!(
            "failed to delete from keyring: {e}"
        ))),
    }
}
