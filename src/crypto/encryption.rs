//! AES-256-GCM sealing of a single field value.
//!
//! `seal` generates a fresh random 96-bit nonce on every call and returns
//! it in front of the ciphertext:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]
//!
//! The envelope layer decides what (if anything) goes in front of that.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{FieldVaultError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Length of a derived AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Encrypt `plaintext` under a derived 32-byte `key`.
///
/// Returns `nonce || ciphertext || tag`.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| FieldVaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| FieldVaultError::EncryptionFailed(format!("AEAD seal failed: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt `nonce || ciphertext || tag` produced by `seal`.
///
/// Any authentication failure (wrong key, flipped bit, truncated tag) is
/// reported as `DecryptionFailed`.
pub fn open(key: &[u8; KEY_LEN], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(FieldVaultError::MalformedEnvelope(format!(
            "sealed data is {} bytes, shorter than the {NONCE_LEN}-byte nonce",
            sealed.len()
        )));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| FieldVaultError::DecryptionFailed)?;

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| FieldVaultError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_output_carries_nonce_and_tag() {
        let key = [0x11u8; KEY_LEN];
        let sealed = seal(&key, b"AB123456C").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + 9 + TAG_LEN);
    }

    #[test]
    fn open_rejects_data_shorter_than_nonce() {
        let key = [0x22u8; KEY_LEN];
        let err = open(&key, &[0u8; 5]).unwrap_err();
        assert!(matches!(err, FieldVaultError::MalformedEnvelope(_)));
    }

    #[test]
    fn open_rejects_tampered_tag() {
        let key = [0x33u8; KEY_LEN];
        let mut sealed = seal(&key, b"sort-code 12-34-56").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            open(&key, &sealed),
            Err(FieldVaultError::DecryptionFailed)
        ));
    }
}
