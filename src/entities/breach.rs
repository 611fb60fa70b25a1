use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SensitiveEntity;
use crate::field::FieldSpec;

/// A person whose data was exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedIndividual {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A data breach incident.
///
/// The narrative fields are encrypted in place; the list of affected
/// individuals is stored as `affectedIndividualsEncrypted`.  Dates,
/// severity, and status stay plaintext for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreachIncident {
    pub id: String,
    pub tenant_id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containment_actions: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_individuals: Vec<AffectedIndividual>,
    pub severity: String,
    pub status: String,
    pub detected_at: DateTime<Utc>,
}

impl SensitiveEntity for BreachIncident {
    const FIELDS: &'static [FieldSpec<'static>] = &[
        FieldSpec::text("description"),
        FieldSpec::text("affectedData"),
        FieldSpec::text("containmentActions"),
        FieldSpec::json("affectedIndividuals", "affectedIndividualsEncrypted"),
    ];
}
