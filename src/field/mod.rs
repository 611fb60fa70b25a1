//! Field-level encryption of entity records.
//!
//! This module provides:
//! - Classification of stored strings as plain, marked, or legacy (`classify`)
//! - `FieldCipher` for single values, structured values, and entities (`cipher`)
//! - Declarative logical-to-storage field tables (`mapping`)
//! - Order-preserving parallel batch processing (`batch`)

pub mod batch;
pub mod cipher;
pub mod classify;
pub mod mapping;

pub use cipher::FieldCipher;
pub use classify::{classify, is_marked, StoredValue, LEGACY_MIN_LEN, MARKER};
pub use mapping::{text_fields, FieldKind, FieldSpec};
