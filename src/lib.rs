//! Field-level encryption at rest.
//!
//! Sensitive values (tax identifiers, bank details, OAuth tokens, incident
//! narratives) are sealed with AES-256-GCM under a key stretched from the
//! master key with PBKDF2, wrapped in a versioned envelope, and stored as
//! `ENC:<base64>`.  Reads transparently accept the two older envelope
//! layouts and unmarked legacy plaintext.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod entities;
pub mod errors;
pub mod field;
pub mod keys;
pub mod service;
pub mod store;
pub mod tokens;

pub use errors::{FieldVaultError, Result};
pub use service::FieldVault;
