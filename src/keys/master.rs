use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::envelope::hash;

/// The process-wide master key string, zeroed when dropped.
///
/// `Debug` never prints the secret; use `fingerprint` to tell keys apart
/// in logs.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    secret: String,
}

impl MasterKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Access the key string (e.g. to pass to the envelope codec).
    pub fn as_str(&self) -> &str {
        &self.secret
    }

    /// First 8 hex characters of the key's SHA-256 digest.
    pub fn fingerprint(&self) -> String {
        hash(&self.secret)[..8].to_string()
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey({})", self.fingerprint())
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.secret.as_bytes().ct_eq(other.secret.as_bytes()).into()
    }
}

impl Eq for MasterKey {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_the_secret() {
        let key = MasterKey::new("super-secret-master-key-value-0123456789");
        let printed = format!("{key:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.starts_with("MasterKey("));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = MasterKey::new("abcdefghijklmnopqrstuvwxyz0123456789");
        let b = MasterKey::new("abcdefghijklmnopqrstuvwxyz0123456789");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 8);
        assert_eq!(a, b);
    }
}
