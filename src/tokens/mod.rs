//! Secure storage for OAuth-style credential pairs.
//!
//! This module provides:
//! - `ScopeKey`, `OAuthToken`, and `TokenMetadata` (`record`)
//! - `TokenStore` with store/get/update/revoke and key rotation (`store`)

pub mod record;
pub mod store;

pub use record::{OAuthToken, ScopeKey, TokenMetadata, SCOPE_SEPARATOR};
pub use store::TokenStore;
