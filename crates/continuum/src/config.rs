//! Configuration: library defaults and vault configuration documents.

use std::path::Path;

use continuum_core::validation::{
    as_mapping, optional_mapping, require_non_empty, require_timestamp, require_vault_id,
};
use continuum_core::{Timestamp, VaultId, Version};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::citation::{load_citation, Citation};
use crate::document::{read_document, Format};
use crate::error::{DocumentKind, Error, Result};

/// Configuration for Continuum operations.
#[derive(Debug, Clone)]
pub struct ContinuityConfig {
    /// Whether citations are checksum-verified on load.
    pub verify_citations: bool,
    /// Version stamped on newly created citations.
    pub citation_version: Version,
    /// Version stamped on newly captured snapshots.
    pub snapshot_version: Version,
    /// Encoding used when writing new citations.
    pub citation_format: Format,
    /// Whether JSON output is indented.
    pub pretty: bool,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            verify_citations: true,
            citation_version: Version::default(),
            snapshot_version: Version::default(),
            citation_format: Format::Yaml,
            pretty: true,
        }
    }
}

impl ContinuityConfig {
    /// Load a citation, verifying its checksum when `verify_citations` is set.
    pub fn load_citation(&self, path: impl AsRef<Path>) -> Result<Citation> {
        load_citation(path, self.verify_citations)
    }
}

/// Configuration document describing a vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultConfig {
    pub vault_id: VaultId,
    pub name: String,
    pub path: String,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl VaultConfig {
    /// Validate a parsed vault configuration document.
    pub fn from_value(value: &Value, document: &str) -> Result<Self> {
        let map = as_mapping(value).map_err(|e| Error::invalid(document, e))?;
        require_vault_id(map, "vault_id").map_err(|e| Error::invalid(document, e))?;
        require_non_empty(map, "name").map_err(|e| Error::invalid(document, e))?;
        require_non_empty(map, "path").map_err(|e| Error::invalid(document, e))?;
        require_timestamp(map, "created_at").map_err(|e| Error::invalid(document, e))?;
        for field in ["storage", "metadata"] {
            optional_mapping(map, field).map_err(|e| Error::invalid(document, e))?;
        }
        serde_json::from_value(value.clone()).map_err(|e| Error::malformed(document, e))
    }

    /// Load a vault configuration from a JSON or YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let value = read_document(path, DocumentKind::VaultConfig)?;
        let config = Self::from_value(&value, &path.display().to_string())?;
        tracing::info!(vault_id = %config.vault_id, path = %path.display(), "loaded vault config");
        Ok(config)
    }
}
