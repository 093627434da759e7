//! SHA-256 checksums over canonical encodings.
//!
//! `checksum` and `verify` are pure: the same logical record always yields the
//! same digest, regardless of how its maps were built in memory.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::canonical::{canonicalize, to_canonical_value};
use crate::error::{CoreError, Result};

/// Name of the field that carries an embedded checksum.
pub const CHECKSUM_FIELD: &str = "checksum";

/// A 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Checksum(pub [u8; 32]);

impl Checksum {
    /// Compute the SHA-256 digest of raw bytes.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex, accepting either case.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidChecksum(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidChecksum(format!("expected 32 bytes in {:?}", s)))?;
        Ok(Self(arr))
    }

    /// Compare against checksum text, ignoring case.
    ///
    /// Text that is not exactly 64 hex digits, surrounding whitespace
    /// included, does not match.
    pub fn matches_hex(&self, expected: &str) -> bool {
        Self::from_hex(expected)
            .map(|other| other == *self)
            .unwrap_or(false)
    }

    /// The zero digest (sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SHA256({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Checksum {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Checksum {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Checksum::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// Checksum of a structured record: SHA-256 over its canonical bytes.
pub fn checksum(record: &Value) -> Checksum {
    Checksum::hash(&canonicalize(record))
}

/// Checksum of any serializable record.
pub fn checksum_of<T: Serialize + ?Sized>(record: &T) -> Result<Checksum> {
    Ok(checksum(&to_canonical_value(record)?))
}

/// Recompute the checksum of `record` and compare to `expected` (case-insensitive).
///
/// A mismatch, or text that is not a digest at all, is a plain `false`.
pub fn verify(record: &Value, expected: &str) -> bool {
    checksum(record).matches_hex(expected)
}

/// Checksum of raw bytes.
pub fn checksum_bytes(data: &[u8]) -> Checksum {
    Checksum::hash(data)
}

/// Checksum of UTF-8 text.
pub fn checksum_text(text: &str) -> Checksum {
    Checksum::hash(text.as_bytes())
}
