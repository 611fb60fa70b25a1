use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SensitiveEntity;
use crate::field::FieldSpec;

/// A provider connection embedded in the settings document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConnection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub connected: bool,
}

/// Per-tenant compliance settings.  Only the HMRC tokens are secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSettings {
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ico_registration_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpo_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmrc: Option<OAuthConnection>,
}

impl SensitiveEntity for ComplianceSettings {
    const FIELDS: &'static [FieldSpec<'static>] = &[
        FieldSpec::text("hmrc.accessToken"),
        FieldSpec::text("hmrc.refreshToken"),
    ];
}
