//! # Continuum
//!
//! The unified API for Continuum: tamper-evident continuity for a persistent
//! identity across time and storage locations.
//!
//! ## Overview
//!
//! - **Citations**: identity-binding documents sealed with a checksum and
//!   linked into a lineage by `predecessor`/`successor`
//! - **Timelines**: append-only ordered event logs for one identity
//! - **Snapshots**: checksummed point-in-time captures of identity state,
//!   always verified on load
//! - **Digests**: file and whole-vault checksums
//!
//! Every checksum is SHA-256 over the canonical encoding in
//! [`core::canonical`], so the same logical record always hashes the same.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use continuum::{load_citation, EventFilter, Timeline};
//!
//! fn example() -> continuum::Result<()> {
//!     let citation = load_citation("vault/citation.yaml", true)?;
//!
//!     let mut timeline = Timeline::load_from_file("vault/timeline.json")?.timeline;
//!     timeline.append_event("session_start", citation.id.as_str(), None)?;
//!     timeline.save_to_file("vault/timeline.json")?;
//!
//!     let starts = timeline
//!         .get_events(&EventFilter::new().event_type("session_start"))
//!         .count();
//!     println!("{} sessions", starts);
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Failures are one of [`ErrorKind::Malformed`], [`ErrorKind::Integrity`],
//! [`ErrorKind::Lineage`], [`ErrorKind::NotFound`] or [`ErrorKind::Io`].
//! Nothing is retried internally.

pub mod citation;
pub mod config;
pub mod digest;
pub mod document;
pub mod error;
pub mod ops;
pub mod snapshot;
pub mod timeline;

// Re-export the core crate
pub use continuum_core as core;

// Re-export main types for convenience
pub use citation::{
    create_citation, load_citation, migrate, parse_citation, save_citation, validate_chain,
    validate_lineage, Attestation, Citation, CitationBuilder, ComplianceLevel,
    ConstitutionalAlignment,
};
pub use config::{ContinuityConfig, VaultConfig};
pub use digest::{compute_file_checksum, compute_vault_checksum, VaultDigest};
pub use document::Format;
pub use error::{DocumentKind, Error, ErrorKind, LineageError, Result};
pub use ops::{
    compute_checksum, init_identity, validate_path, ChecksumReport, InitializedIdentity,
    ValidationOutcome, ValidationStatus,
};
pub use snapshot::{
    capture_snapshot, compare_snapshots, load_snapshot, save_snapshot, SnapshotBuilder,
    SnapshotDiff, StateSnapshot,
};
pub use timeline::{
    validate_events, EventBuilder, EventFilter, LoadReport, Timeline, TimelineEvent,
    TimelineLoad, TimelineSummary,
};

// Re-export commonly used core types
pub use continuum_core::{
    canonicalize, checksum, verify, Checksum, CitationId, EventId, EventType, Keypair, SnapshotId,
    Timestamp, VaultId, Version,
};
