//! BLAKE3 content digests.

use serde::{Deserialize, Serialize};

/// BLAKE3 digest of a payload slice.
///
/// Two bundles built against the same installed package produce identical
/// provided slices, so comparing slice digests shows at a glance which
/// dependencies a federated page can actually share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blake3Hash(String);

impl Blake3Hash {
    /// Create a new `Blake3Hash` from a raw hex string (64 hex chars).
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Compute BLAKE3 hash of data.
    pub fn compute(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self(hash.to_hex().to_string())
    }

    /// Return the inner hex string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for tables and logs.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Blake3Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
