//! # Continuum Core
//!
//! Pure primitives for Continuum: canonical encoding, checksums, identifiers,
//! and field validation.
//!
//! This crate contains no file I/O. It is pure computation over structured
//! records.
//!
//! ## Key Types
//!
//! - [`Checksum`] - SHA-256 digest of a canonical encoding
//! - [`CitationId`], [`VaultId`] - pattern-checked identity identifiers
//! - [`EventId`], [`EventType`] - timeline event identifiers and vocabulary
//! - [`Timestamp`] - ISO-8601 UTC time, kept verbatim for stable hashing
//!
//! ## Canonicalization
//!
//! All checksums are computed over canonical JSON. See [`canonical`] module.

pub mod canonical;
pub mod checksum;
pub mod crypto;
pub mod error;
pub mod types;
pub mod validation;

pub use canonical::{canonical_string, canonicalize, strip_field, to_canonical_value};
pub use checksum::{
    checksum, checksum_bytes, checksum_of, checksum_text, verify, Checksum, CHECKSUM_FIELD,
};
pub use crypto::{Keypair, PublicKey, Signature};
pub use error::{CoreError, ValidationError};
pub use types::{CitationId, EventId, EventType, SnapshotId, Timestamp, VaultId, Version};

/// Re-exported so callers can build records without a direct `serde_json` dependency.
pub use serde_json::{Map, Value};
