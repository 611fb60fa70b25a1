use serde::{Deserialize, Serialize};

use super::SensitiveEntity;
use crate::field::FieldSpec;

/// Payroll bank details, stored encrypted as one structured value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub account_name: String,
    pub sort_code: String,
    pub account_number: String,
}

/// An employee record.
///
/// `niNumber`, `taxReference`, and `dateOfBirth` are encrypted in place;
/// `bankDetails` is stored as `bankDetailsEncrypted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ni_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_details: Option<BankDetails>,
}

impl SensitiveEntity for Employee {
    const FIELDS: &'static [FieldSpec<'static>] = &[
        FieldSpec::text("niNumber"),
        FieldSpec::text("taxReference"),
        FieldSpec::text("dateOfBirth"),
        FieldSpec::json("bankDetails", "bankDetailsEncrypted"),
    ];
}
