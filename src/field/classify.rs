//! Classification of a persisted field value.
//!
//! Current data carries the `ENC:` marker.  Data written before the marker
//! existed is a bare base64 envelope, which can only be told apart from a
//! plaintext value by shape: at least `LEGACY_MIN_LEN` characters and
//! valid padded base64.

use std::sync::OnceLock;

use regex::Regex;

/// Prefix that flags a stored value as encrypted.
pub const MARKER: &str = "ENC:";

/// Shortest bare value that may be a legacy envelope.
pub const LEGACY_MIN_LEN: usize = 60;

/// What a stored string turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredValue<'a> {
    /// Ordinary plaintext.
    Plain(&'a str),
    /// Marked ciphertext; holds the envelope with the marker removed.
    Marked(&'a str),
    /// Unmarked, but shaped like a legacy envelope.
    LegacySuspect(&'a str),
}

fn base64_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").expect("base64 shape regex is valid"))
}

/// `true` if `value` is padded standard base64.
pub fn looks_like_base64(value: &str) -> bool {
    value.len() % 4 == 0 && base64_shape().is_match(value)
}

/// Classify a stored value.
pub fn classify(value: &str) -> StoredValue<'_> {
    if let Some(envelope) = value.strip_prefix(MARKER) {
        return StoredValue::Marked(envelope);
    }
    if value.len() >= LEGACY_MIN_LEN && looks_like_base64(value) {
        return StoredValue::LegacySuspect(value);
    }
    StoredValue::Plain(value)
}

/// `true` if `value` carries the marker.
pub fn is_marked(value: &str) -> bool {
    value.starts_with(MARKER)
}

/// Prefix an envelope with the marker.
pub fn mark(envelope: &str) -> String {
    let mut out = String::with_capacity(MARKER.len() + envelope.len());
    out.push_str(MARKER);
    out.push_str(envelope);
    out
}

/// Remove the marker if present.
pub fn strip_marker(value: &str) -> &str {
    value.strip_prefix(MARKER).unwrap_or(value)
}
