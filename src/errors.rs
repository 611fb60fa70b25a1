use std::time::Duration;

use thiserror::Error;

/// All errors that can occur in FieldVault.
///
/// An unmarked value that looks like legacy ciphertext but fails to decrypt
/// is not an error: it is logged and returned as plaintext.
#[derive(Debug, Error)]
pub enum FieldVaultError {
    // --- Key errors ---
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // --- Crypto errors ---
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Decryption failed: wrong key or tampered data")]
    DecryptionFailed,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Token store errors ---
    #[error("Invalid token scope: {0}")]
    InvalidScope(String),

    // --- Store errors ---
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Store operation timed out after {0:?}")]
    StoreTimeout(Duration),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for FieldVaultError {
    fn from(e: serde_json::Error) -> Self {
        FieldVaultError::SerializationError(e.to_string())
    }
}

/// Convenience type alias for FieldVault results.
pub type Result<T> = std::result::Result<T, FieldVaultError>;
