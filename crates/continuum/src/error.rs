//! Error types for Continuum.

use std::fmt;
use std::path::{Path, PathBuf};

use continuum_core::{CitationId, ValidationError};
use thiserror::Error;

/// The kinds of document Continuum reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Citation,
    Timeline,
    Snapshot,
    VaultConfig,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Citation => "citation",
            DocumentKind::Timeline => "timeline",
            DocumentKind::Snapshot => "snapshot",
            DocumentKind::VaultConfig => "vault config",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broken predecessor/successor links between citations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineageError {
    /// `old.successor` does not name `new`.
    #[error("successor of {old:?} is {found:?}, expected {expected:?}")]
    SuccessorMismatch {
        old: CitationId,
        expected: CitationId,
        found: Option<CitationId>,
    },

    /// `new.predecessor` does not name `old`.
    #[error("predecessor of {new:?} is {found:?}, expected {expected:?}")]
    PredecessorMismatch {
        new: CitationId,
        expected: CitationId,
        found: Option<CitationId>,
    },

    /// A citation names itself as predecessor or successor.
    #[error("citation {0:?} references itself")]
    SelfReference(CitationId),

    /// A chain is broken at `index` (a link in or out of the chain's ends).
    #[error("lineage chain broken at index {index}: {reason}")]
    Broken { index: usize, reason: String },
}

/// Coarse error category, for callers that only need to branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Malformed,
    Integrity,
    Lineage,
    NotFound,
    Io,
}

/// Errors that can occur during Continuum operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The document does not have the expected shape.
    #[error("malformed {document}: {reason}")]
    Malformed { document: String, reason: String },

    /// The document is well formed but its checksum does not match.
    #[error("integrity check failed for {document}: expected {expected}, computed {actual}")]
    Integrity {
        document: String,
        expected: String,
        actual: String,
    },

    /// Inconsistent lineage between citations.
    #[error("lineage error: {0}")]
    Lineage(#[from] LineageError),

    /// A referenced path does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// I/O error.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Malformed { .. } => ErrorKind::Malformed,
            Error::Integrity { .. } => ErrorKind::Integrity,
            Error::Lineage(_) => ErrorKind::Lineage,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn malformed(document: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Error::Malformed {
            document: document.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid(document: impl fmt::Display, err: ValidationError) -> Self {
        Self::malformed(document, err)
    }

    /// Map an I/O error, turning a missing file into `NotFound`.
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.to_path_buf())
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn is_integrity(&self) -> bool {
        self.kind() == ErrorKind::Integrity
    }

    pub fn is_malformed(&self) -> bool {
        self.kind() == ErrorKind::Malformed
    }
}

/// Result type for Continuum operations.
pub type Result<T> = std::result::Result<T, Error>;
