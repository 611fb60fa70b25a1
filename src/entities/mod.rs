//! Entity types with declared sensitive fields.
//!
//! Each entity implements `SensitiveEntity` by listing its field table;
//! `FieldCipher::seal_entity` / `open_entity` do the rest.
//!
//! This module provides:
//! - Employee records with PII and bank details (`employee`)
//! - Compliance settings holding provider OAuth tokens (`compliance`)
//! - Breach incident narratives (`breach`)
//! - Ad-hoc field lists on arbitrary JSON objects (`generic`)

pub mod breach;
pub mod compliance;
pub mod employee;
pub mod generic;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::Result;
use crate::field::{FieldCipher, FieldSpec};

pub use breach::{AffectedIndividual, BreachIncident};
pub use compliance::{ComplianceSettings, OAuthConnection};
pub use employee::{BankDetails, Employee};
pub use generic::{decrypt_sensitive_fields, encrypt_sensitive_fields};

/// A record type whose serialized form has fields that must be encrypted.
pub trait SensitiveEntity: Serialize + DeserializeOwned {
    /// Logical-to-storage table for the sensitive fields.
    const FIELDS: &'static [FieldSpec<'static>];
}

impl FieldCipher {
    /// Serialize `entity` and encrypt its declared fields.
    pub fn seal_entity<T: SensitiveEntity>(&self, entity: &T) -> Result<Value> {
        let logical = serde_json::to_value(entity)?;
        self.encrypt_entity(&logical, T::FIELDS)
    }

    /// Decrypt the declared fields of a stored document and deserialize it.
    pub fn open_entity<T: SensitiveEntity>(&self, stored: &Value) -> Result<T> {
        let logical = self.decrypt_entity(stored, T::FIELDS)?;
        Ok(serde_json::from_value(logical)?)
    }

    /// Seal a batch of entities, preserving order.
    pub fn seal_entities<T: SensitiveEntity>(&self, entities: &[T]) -> Result<Vec<Value>> {
        let logical = entities
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.encrypt_all(&logical, T::FIELDS)
    }

    /// Open a batch of stored documents, preserving order.
    pub fn open_entities<T: SensitiveEntity>(&self, stored: &[Value]) -> Result<Vec<T>> {
        self.decrypt_all(stored, T::FIELDS)?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .collect()
    }
}
