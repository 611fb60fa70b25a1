//! Token store types: scope keys, logical tokens, and persisted records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{FieldVaultError, Result};

/// Separator between scope key components.
pub const SCOPE_SEPARATOR: char = ':';

/// Identifies one token record: tenant, provider, and provider environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub tenant_id: String,
    pub provider: String,
    pub environment: String,
}

impl ScopeKey {
    /// Build and validate a scope key.
    ///
    /// Components must be non-empty and may not contain `/` or `:`.
    pub fn new(
        tenant_id: impl Into<String>,
        provider: impl Into<String>,
        environment: impl Into<String>,
    ) -> Result<Self> {
        let key = Self {
            tenant_id: tenant_id.into(),
            provider: provider.into(),
            environment: environment.into(),
        };
        for (label, value) in [
            ("tenant id", &key.tenant_id),
            ("provider", &key.provider),
            ("environment", &key.environment),
        ] {
            validate_component(label, value)?;
        }
        Ok(key)
    }

    /// Deterministic record key: `tenant:provider:environment`.
    pub fn storage_key(&self) -> String {
        format!(
            "{}{SCOPE_SEPARATOR}{}{SCOPE_SEPARATOR}{}",
            self.tenant_id, self.provider, self.environment
        )
    }

    /// Parse a key produced by `storage_key`.
    pub fn parse(storage_key: &str) -> Result<Self> {
        let mut parts = storage_key.split(SCOPE_SEPARATOR);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(tenant), Some(provider), Some(env), None) => Self::new(tenant, provider, env),
            _ => Err(FieldVaultError::InvalidScope(format!(
                "'{storage_key}' is not a tenant{SCOPE_SEPARATOR}provider{SCOPE_SEPARATOR}environment key"
            ))),
        }
    }
}

pub(crate) fn validate_component(label: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(FieldVaultError::InvalidScope(format!("{label} cannot be empty")));
    }
    if value.contains('/') || value.contains(SCOPE_SEPARATOR) {
        return Err(FieldVaultError::InvalidScope(format!(
            "{label} '{value}' may not contain '/' or '{SCOPE_SEPARATOR}'"
        )));
    }
    Ok(())
}

/// A decrypted OAuth credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub scope: Option<String>,
    pub token_type: String,
}

impl OAuthToken {
    /// Build a bearer token that expires `expires_in_secs` after `now`.
    ///
    /// `expires_in_secs` usually comes straight from a provider response;
    /// a value whose expiry is not representable is `InvalidInput`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let expires_at = Duration::try_seconds(expires_in_secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                FieldVaultError::InvalidInput(format!(
                    "token lifetime of {expires_in_secs} seconds is out of range"
                ))
            })?;

        Ok(Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            scope: None,
            token_type: "Bearer".to_string(),
        })
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Expiry information derived from plaintext metadata only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub expires_at: DateTime<Utc>,
    pub is_valid: bool,
    pub needs_refresh: bool,
    pub scope: Option<String>,
    pub token_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// The persisted document.  Both token fields hold ciphertext; everything
/// else is plaintext so metadata reads never need the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenRecord {
    pub encrypted_access_token: String,
    pub encrypted_refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub token_type: String,
    pub tenant_id: String,
    pub provider: String,
    pub environment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// The subset of a record read by `get_token_metadata`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordMetadata {
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_refreshed: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl RecordMetadata {
    pub fn evaluate(self, now: DateTime<Utc>, refresh_buffer: Duration) -> TokenMetadata {
        TokenMetadata {
            is_valid: self.expires_at > now,
            needs_refresh: self.expires_at - now < refresh_buffer,
            expires_at: self.expires_at,
            scope: self.scope,
            token_type: self.token_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_refreshed: self.last_refreshed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_joins_in_fixed_order() {
        let key = ScopeKey::new("acme-co", "hmrc", "sandbox").unwrap();
        assert_eq!(key.storage_key(), "acme-co:hmrc:sandbox");
        assert_eq!(ScopeKey::parse("acme-co:hmrc:sandbox").unwrap(), key);
    }

    #[test]
    fn scope_components_are_validated() {
        assert!(ScopeKey::new("", "hmrc", "sandbox").is_err());
        assert!(ScopeKey::new("acme/co", "hmrc", "sandbox").is_err());
        assert!(ScopeKey::new("acme", "hm:rc", "sandbox").is_err());
        assert!(ScopeKey::parse("acme:hmrc").is_err());
        assert!(ScopeKey::parse("a:b:c:d").is_err());
    }

    #[test]
    fn token_expiry_is_relative_to_now() {
        let now = Utc::now();
        let token = OAuthToken::new("a", "r", 3600, now).unwrap();
        assert_eq!(token.expires_at, now + Duration::hours(1));
        assert_eq!(token.token_type, "Bearer");

        let expired = OAuthToken::new("a", "r", -60, now).unwrap();
        assert!(expired.expires_at < now);
    }

    #[test]
    fn out_of_range_lifetimes_are_rejected() {
        let now = Utc::now();
        for secs in [i64::MAX, i64::MIN, i64::MAX / 1000, 10_000_000_000_000] {
            assert!(
                matches!(
                    OAuthToken::new("a", "r", secs, now),
                    Err(FieldVaultError::InvalidInput(_))
                ),
                "lifetime {secs} should be rejected"
            );
        }
    }

    #[test]
    fn metadata_flags_follow_expiry_and_buffer() {
        let now = Utc::now();
        let meta = RecordMetadata {
            expires_at: now + Duration::minutes(4),
            scope: None,
            token_type: "Bearer".into(),
            created_at: now,
            updated_at: now,
            last_refreshed: None,
        }
        .evaluate(now, Duration::minutes(5));
        assert!(meta.is_valid);
        assert!(meta.needs_refresh);

        let expired = RecordMetadata {
            expires_at: now - Duration::seconds(1),
            scope: None,
            token_type: "Bearer".into(),
            created_at: now,
            updated_at: now,
            last_refreshed: None,
        }
        .evaluate(now, Duration::minutes(5));
        assert!(!expired.is_valid);
        assert!(expired.needs_refresh);
    }
}
