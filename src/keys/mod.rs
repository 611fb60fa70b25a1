//! Master key resolution, validation, and caching.
//!
//! This module provides:
//! - The zeroizing `MasterKey` wrapper (`master`)
//! - Named configuration sources the key is looked up in (`source`)
//! - The `KeyManager` that resolves, validates, and caches the key (`manager`)
//! - OS keyring lookups behind the `keyring-store` feature (`keyring`)

pub mod manager;
pub mod master;
pub mod source;

#[cfg(feature = "keyring-store")]
pub mod keyring;

pub use manager::{validate, KeyManager, KeyResolution, KeyValidation, FALLBACK_KEY, MIN_KEY_LEN};
pub use master::MasterKey;
pub use source::{ConfigSource, EnvSource, MapSource};
