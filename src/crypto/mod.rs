//! Cryptographic primitives for FieldVault.
//!
//! This module provides:
//! - AES-256-GCM sealing and opening (`encryption`)
//! - PBKDF2-HMAC-SHA256 key stretching (`kdf`)
//! - The versioned base64 envelope format and SHA-256 hashing (`envelope`)

pub mod encryption;
pub mod envelope;
pub mod kdf;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, hash};
pub use envelope::{
    decrypt, decrypt_detailed, encrypt, hash, verify_hash, EnvelopeVersion, Opened,
    CURRENT_VERSION,
};
pub use kdf::{derive_key, generate_salt, LEGACY_SALT, PBKDF2_ITERATIONS, SALT_LEN};
