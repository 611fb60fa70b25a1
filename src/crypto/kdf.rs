//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! The master key is a long configuration string, not a byte key, so every
//! envelope stretches it with its own salt.  The parameters below are part
//! of the stored format: changing any of them makes existing envelopes
//! unreadable.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use super::encryption::KEY_LEN;
use crate::errors::{FieldVaultError, Result};

/// Length of the per-envelope salt in bytes.
pub const SALT_LEN: usize = 16;

/// PBKDF2 iteration count used for every envelope version.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt used by version-0 envelopes, which predate per-envelope salts.
pub const LEGACY_SALT: &[u8; SALT_LEN] = b"fieldvault-salt!";

/// Derive a 32-byte AES key from the master key string and a salt.
///
/// The same key + salt always produce the same output.
pub fn derive_key(master_key: &str, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    if master_key.is_empty() {
        return Err(FieldVaultError::KeyDerivationFailed(
            "master key must not be empty".into(),
        ));
    }
    if salt.is_empty() {
        return Err(FieldVaultError::KeyDerivationFailed(
            "salt must not be empty".into(),
        ));
    }

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(master_key.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    Ok(key)
}

/// Generate a cryptographically random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
