//! Versioned, self-describing cipher envelopes.
//!
//! An envelope is base64 over one of three byte layouts:
//!
//! ```text
//! v2 (current): [version: 1 byte = 2][salt: 16 bytes][nonce: 12 bytes][ciphertext + tag]
//! v1 (legacy):                       [salt: 16 bytes][nonce: 12 bytes][ciphertext + tag]
//! v0 (legacy):                                       [nonce: 12 bytes][ciphertext + tag]
//! ```
//!
//! Version 0 derives its key with the fixed `LEGACY_SALT`.  Only version 2
//! is ever written; the older layouts stay readable so rows stored before
//! the salt and the version tag existed can still be opened.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::encryption::{self, NONCE_LEN};
use super::kdf::{self, LEGACY_SALT, SALT_LEN};
use crate::errors::{FieldVaultError, Result};

/// Version byte written at the front of every new envelope.
pub const CURRENT_VERSION: u8 = 2;

/// Smallest decoded length that can hold a version-2 header.
const V2_MIN_LEN: usize = 1 + SALT_LEN + NONCE_LEN;

/// Smallest decoded length that can hold a version-1 header.
const V1_MIN_LEN: usize = SALT_LEN + NONCE_LEN;

/// Smallest decoded length that can hold a version-0 header.
const V0_MIN_LEN: usize = NONCE_LEN;

/// The byte layout an envelope was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeVersion {
    /// Nonce + ciphertext, key derived with the fixed legacy salt.
    V0,
    /// Salt + nonce + ciphertext, no version tag.
    V1,
    /// Version tag + salt + nonce + ciphertext.
    V2,
}

impl EnvelopeVersion {
    pub fn as_u8(self) -> u8 {
        match self {
            EnvelopeVersion::V0 => 0,
            EnvelopeVersion::V1 => 1,
            EnvelopeVersion::V2 => CURRENT_VERSION,
        }
    }

    /// `true` for layouts that should be rewritten as version 2.
    pub fn is_legacy(self) -> bool {
        self != EnvelopeVersion::V2
    }
}

/// A successfully opened envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    pub plaintext: String,
    pub version: EnvelopeVersion,
}

/// One way of reading the decoded bytes.
struct Layout<'a> {
    version: EnvelopeVersion,
    salt: &'a [u8],
    sealed: &'a [u8],
}

/// Encrypt `plaintext` under `master_key` as a current-version envelope.
///
/// Every call draws a fresh salt and nonce, so encrypting the same value
/// twice yields two different envelopes.
pub fn encrypt(plaintext: &str, master_key: &str) -> Result<String> {
    if plaintext.is_empty() {
        return Err(FieldVaultError::InvalidInput(
            "plaintext must not be empty".into(),
        ));
    }
    if master_key.is_empty() {
        return Err(FieldVaultError::InvalidInput(
            "encryption key must not be empty".into(),
        ));
    }

    let salt = kdf::generate_salt();
    let mut derived = kdf::derive_key(master_key, &salt)?;
    let sealed = encryption::seal(&derived, plaintext.as_bytes());
    derived.zeroize();
    let sealed = sealed?;

    let mut buf = Vec::with_capacity(1 + SALT_LEN + sealed.len());
    buf.push(CURRENT_VERSION);
    buf.extend_from_slice(&salt);
    buf.extend_from_slice(&sealed);

    Ok(BASE64.encode(buf))
}

/// Decrypt an envelope produced by any supported version.
pub fn decrypt(envelope: &str, master_key: &str) -> Result<String> {
    decrypt_detailed(envelope, master_key).map(|opened| opened.plaintext)
}

/// Decrypt an envelope and report which layout opened it.
///
/// Layouts are tried in the order v2, v1, v0 (skipping any the decoded
/// length cannot hold).  A version-1 salt usually starts with a non-zero
/// byte that looks like a version tag, so an authentication failure under
/// one layout falls through to the next.  `DecryptionFailed` is returned
/// only when no applicable layout authenticates.
pub fn decrypt_detailed(envelope: &str, master_key: &str) -> Result<Opened> {
    if master_key.is_empty() {
        return Err(FieldVaultError::InvalidInput(
            "decryption key must not be empty".into(),
        ));
    }

    let bytes = BASE64
        .decode(envelope.trim())
        .map_err(|e| FieldVaultError::MalformedEnvelope(format!("invalid base64: {e}")))?;

    let layouts = candidate_layouts(&bytes)?;

    for layout in layouts {
        let mut derived = kdf::derive_key(master_key, layout.salt)?;
        let result = encryption::open(&derived, layout.sealed);
        derived.zeroize();

        match result {
            Ok(plaintext) => {
                tracing::debug!(version = layout.version.as_u8(), "opened envelope");
                let plaintext = String::from_utf8(plaintext).map_err(|e| {
                    let mut bad_bytes = e.into_bytes();
                    bad_bytes.zeroize();
                    FieldVaultError::SerializationError(
                        "decrypted value is not valid UTF-8".to_string(),
                    )
                })?;
                return Ok(Opened {
                    plaintext,
                    version: layout.version,
                });
            }
            Err(FieldVaultError::DecryptionFailed) => continue,
            Err(other) => return Err(other),
        }
    }

    Err(FieldVaultError::DecryptionFailed)
}

/// Work out which layouts the decoded bytes could be, most recent first.
fn candidate_layouts(bytes: &[u8]) -> Result<Vec<Layout<'_>>> {
    if bytes.len() < V0_MIN_LEN {
        return Err(FieldVaultError::MalformedEnvelope(format!(
            "envelope is {} bytes, need at least {V0_MIN_LEN}",
            bytes.len()
        )));
    }

    let mut layouts = Vec::with_capacity(3);

    if bytes.len() >= V2_MIN_LEN && bytes[0] != 0 {
        layouts.push(Layout {
            version: EnvelopeVersion::V2,
            salt: &bytes[1..1 + SALT_LEN],
            sealed: &bytes[1 + SALT_LEN..],
        });
    }
    if bytes.len() >= V1_MIN_LEN {
        layouts.push(Layout {
            version: EnvelopeVersion::V1,
            salt: &bytes[..SALT_LEN],
            sealed: &bytes[SALT_LEN..],
        });
    }
    layouts.push(Layout {
        version: EnvelopeVersion::V0,
        salt: LEGACY_SALT,
        sealed: bytes,
    });

    Ok(layouts)
}

/// One-way SHA-256 digest of `data` as lowercase hex.
///
/// For lookups and equality checks, never for secrecy.
pub fn hash(data: &str) -> String {
    format!("{:x}", Sha256::digest(data.as_bytes()))
}

/// Compare `data` against a stored hex digest in constant time.
pub fn verify_hash(data: &str, expected_hex: &str) -> bool {
    let actual = hash(data);
    actual
        .as_bytes()
        .ct_eq(expected_hex.to_ascii_lowercase().as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "unit-test-master-key-with-enough-length-0123456789";

    #[test]
    fn encrypt_writes_version_two_header() {
        let envelope = encrypt("hello", KEY).unwrap();
        let bytes = BASE64.decode(envelope).unwrap();
        assert_eq!(bytes[0], CURRENT_VERSION);
        assert_eq!(bytes.len(), 1 + SALT_LEN + NONCE_LEN + 5 + 16);
    }

    #[test]
    fn decrypt_detailed_reports_current_version() {
        let envelope = encrypt("hello", KEY).unwrap();
        let opened = decrypt_detailed(&envelope, KEY).unwrap();
        assert_eq!(opened.plaintext, "hello");
        assert_eq!(opened.version, EnvelopeVersion::V2);
        assert!(!opened.version.is_legacy());
    }

    #[test]
    fn short_envelope_is_malformed() {
        let envelope = BASE64.encode([1u8; 11]);
        assert!(matches!(
            decrypt(&envelope, KEY),
            Err(FieldVaultError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn non_base64_is_malformed() {
        assert!(matches!(
            decrypt("not base64 at all!", KEY),
            Err(FieldVaultError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(matches!(
            encrypt("", KEY),
            Err(FieldVaultError::InvalidInput(_))
        ));
        assert!(matches!(
            encrypt("x", ""),
            Err(FieldVaultError::InvalidInput(_))
        ));
    }

    #[test]
    fn candidate_layouts_follow_length_rules() {
        let v0_only = [5u8; 20];
        let layouts = candidate_layouts(&v0_only).unwrap();
        assert_eq!(layouts.len(), 1);
        assert_eq!(layouts[0].version, EnvelopeVersion::V0);

        let v1_and_v0 = [5u8; 28];
        let versions: Vec<_> = candidate_layouts(&v1_and_v0)
            .unwrap()
            .iter()
            .map(|l| l.version)
            .collect();
        assert_eq!(versions, vec![EnvelopeVersion::V1, EnvelopeVersion::V0]);

        let mut zero_lead = [5u8; 40];
        zero_lead[0] = 0;
        let versions: Vec<_> = candidate_layouts(&zero_lead)
            .unwrap()
            .iter()
            .map(|l| l.version)
            .collect();
        assert_eq!(versions, vec![EnvelopeVersion::V1, EnvelopeVersion::V0]);

        let all = [5u8; 40];
        assert_eq!(candidate_layouts(&all).unwrap().len(), 3);
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn verify_hash_accepts_uppercase_digest() {
        let digest = hash("AB123456C").to_uppercase();
        assert!(verify_hash("AB123456C", &digest));
        assert!(!verify_hash("AB123456D", &digest));
    }
}
