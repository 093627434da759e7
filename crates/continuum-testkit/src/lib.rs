//! # Continuum Testkit
//!
//! Testing utilities for Continuum.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known canonical encodings and checksums for cross-implementation verification
//! - **Generators**: Proptest strategies for structured records and identifiers
//! - **Fixtures**: A deterministic identity with citation, timeline and snapshot helpers
//!
//! ## Golden Vectors
//!
//! ```rust
//! use continuum_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, checksum) in verify_all_vectors() {
//!     assert!(matches, "{}: {}", name, checksum);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use continuum_testkit::generators::record;
//!
//! proptest! {
//!     #[test]
//!     fn checksum_is_deterministic(value in record()) {
//!         prop_assert_eq!(checksum(&value), checksum(&value));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use continuum_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let citation = fixture.citation();
//! assert!(citation.verify());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{timeline_missing_actor, TestFixture};
pub use generators::{mapping, record, reorder_keys};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
