//! Master Citations: the documents that bind an identity to a vault.
//!
//! A citation is sealed with the SHA-256 checksum of its canonical form minus
//! the `checksum` field. Successive citations of one identity form a
//! singly-linked lineage through `predecessor`/`successor`.

use std::path::Path;

use continuum_core::validation::{
    as_mapping, optional_citation_id, optional_mapping, optional_str_list, require_checksum_text,
    require_citation_id, require_str, require_timestamp, require_vault_id, require_version,
};
use continuum_core::{
    canonicalize, checksum, strip_field, Checksum, CitationId, Keypair, PublicKey, Signature,
    Timestamp, ValidationError, VaultId, Version, CHECKSUM_FIELD,
};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::document::{read_document, write_document, Format};
use crate::error::{DocumentKind, Error, LineageError, Result};

/// Domain separation prefix for citation attestations.
pub const ATTEST_DOMAIN: &[u8] = b"continuum/citation-attest/v1";

const PREDECESSOR: &str = "predecessor";
const SUCCESSOR: &str = "successor";
const ALIGNMENT: &str = "constitutional_alignment";
const METADATA: &str = "metadata";

/// Fields the citation type models directly; anything else is carried in `extra`.
const KNOWN_FIELDS: [&str; 9] = [
    "id",
    "version",
    "vault_id",
    "created_at",
    CHECKSUM_FIELD,
    PREDECESSOR,
    SUCCESSOR,
    ALIGNMENT,
    METADATA,
];

const OPTIONAL_FIELDS: [&str; 4] = [PREDECESSOR, SUCCESSOR, ALIGNMENT, METADATA];

/// How fully an identity adheres to its constitutional framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComplianceLevel {
    Full,
    Partial,
    Minimal,
    None,
}

impl ComplianceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceLevel::Full => "full",
            ComplianceLevel::Partial => "partial",
            ComplianceLevel::Minimal => "minimal",
            ComplianceLevel::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(ComplianceLevel::Full),
            "partial" => Some(ComplianceLevel::Partial),
            "minimal" => Some(ComplianceLevel::Minimal),
            "none" => Some(ComplianceLevel::None),
            _ => None,
        }
    }
}

/// Policy metadata attached to a citation.
///
/// Only the shape is checked; keys other than `compliance_level` and
/// `rights_bundle` pass through untouched, as does an explicit
/// `rights_bundle: null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstitutionalAlignment {
    pub compliance_level: ComplianceLevel,
    pub rights_bundle: Option<Vec<String>>,
    pub extra: Map<String, Value>,
}

impl ConstitutionalAlignment {
    pub fn new(compliance_level: ComplianceLevel) -> Self {
        Self {
            compliance_level,
            rights_bundle: None,
            extra: Map::new(),
        }
    }

    pub fn with_rights<I, S>(mut self, rights: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rights_bundle = Some(rights.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_value(value: &Value) -> std::result::Result<Self, ValidationError> {
        let map = value.as_object().ok_or_else(|| ValidationError::WrongType {
            field: ALIGNMENT.to_string(),
            expected: "a mapping",
        })?;
        let level_field = format!("{}.compliance_level", ALIGNMENT);
        let level = require_str(map, "compliance_level").map_err(|e| e.with_field(&level_field))?;
        let compliance_level =
            ComplianceLevel::parse(level).ok_or_else(|| ValidationError::UnsupportedValue {
                field: level_field.clone(),
                value: level.to_string(),
            })?;
        let rights_bundle = optional_str_list(map, "rights_bundle")
            .map_err(|e| e.with_field(format!("{}.rights_bundle", ALIGNMENT)))?;
        let extra = map
            .iter()
            .filter(|(k, v)| match k.as_str() {
                "compliance_level" => false,
                "rights_bundle" => v.is_null(),
                _ => true,
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Self {
            compliance_level,
            rights_bundle,
            extra,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert(
            "compliance_level".into(),
            Value::String(self.compliance_level.as_str().into()),
        );
        if let Some(rights) = &self.rights_bundle {
            map.insert("rights_bundle".into(), json!(rights));
        }
        Value::Object(map)
    }
}

/// A sealed Master Citation.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub id: CitationId,
    pub version: Version,
    pub vault_id: VaultId,
    pub created_at: Timestamp,
    pub predecessor: Option<CitationId>,
    pub successor: Option<CitationId>,
    pub constitutional_alignment: Option<ConstitutionalAlignment>,
    pub metadata: Option<Map<String, Value>>,
    /// Unmodelled top-level fields. They are part of the sealed form.
    pub extra: Map<String, Value>,
    pub checksum: Checksum,
    /// Optional fields the source document left out entirely, so they are
    /// left out again when the citation is re-encoded.
    omitted: Vec<&'static str>,
}

impl Citation {
    /// Validate a parsed citation document. The checksum is not verified.
    pub fn from_value(value: &Value) -> std::result::Result<Self, ValidationError> {
        let map = as_mapping(value)?;
        let id = require_citation_id(map, "id")?;
        let version = require_version(map, "version")?;
        let vault_id = require_vault_id(map, "vault_id")?;
        let created_at = require_timestamp(map, "created_at")?;
        let checksum_text = require_checksum_text(map, CHECKSUM_FIELD)?;
        let checksum =
            Checksum::from_hex(checksum_text).map_err(|_| ValidationError::InvalidChecksum {
                field: CHECKSUM_FIELD.to_string(),
                value: checksum_text.to_string(),
            })?;
        let predecessor = optional_citation_id(map, PREDECESSOR)?;
        let successor = optional_citation_id(map, SUCCESSOR)?;
        let constitutional_alignment = match map.get(ALIGNMENT) {
            None | Some(Value::Null) => None,
            Some(v) => Some(ConstitutionalAlignment::from_value(v)?),
        };
        let metadata = optional_mapping(map, METADATA)?.cloned();

        let extra = map
            .iter()
            .filter(|(k, _)| !KNOWN_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let omitted = OPTIONAL_FIELDS
            .iter()
            .copied()
            .filter(|field| !map.contains_key(*field))
            .collect();

        Ok(Self {
            id,
            version,
            vault_id,
            created_at,
            predecessor,
            successor,
            constitutional_alignment,
            metadata,
            extra,
            checksum,
            omitted,
        })
    }

    /// The sealed form: every field except `checksum`.
    pub fn unsealed_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert("id".into(), Value::String(self.id.to_string()));
        map.insert("version".into(), Value::String(self.version.to_string()));
        map.insert("vault_id".into(), Value::String(self.vault_id.to_string()));
        map.insert(
            "created_at".into(),
            Value::String(self.created_at.to_string()),
        );

        let optional = [
            (PREDECESSOR, self.predecessor.as_ref().map(|id| json!(id))),
            (SUCCESSOR, self.successor.as_ref().map(|id| json!(id))),
            (
                ALIGNMENT,
                self.constitutional_alignment
                    .as_ref()
                    .map(ConstitutionalAlignment::to_value),
            ),
            (METADATA, self.metadata.clone().map(Value::Object)),
        ];
        for (field, value) in optional {
            match value {
                Some(v) => {
                    map.insert(field.into(), v);
                }
                None if self.omitted.contains(&field) => {}
                None => {
                    map.insert(field.into(), Value::Null);
                }
            }
        }
        Value::Object(map)
    }

    /// The full document, checksum included.
    pub fn to_value(&self) -> Value {
        let mut value = self.unsealed_value();
        if let Value::Object(map) = &mut value {
            map.insert(CHECKSUM_FIELD.into(), Value::String(self.checksum.to_hex()));
        }
        value
    }

    /// Recompute the checksum over the current field values.
    pub fn compute_checksum(&self) -> Checksum {
        checksum(&self.unsealed_value())
    }

    /// Whether the stored checksum matches the current field values.
    pub fn verify(&self) -> bool {
        self.compute_checksum() == self.checksum
    }

    /// Like [`Citation::verify`], reporting a mismatch as an integrity error.
    pub fn verify_integrity(&self) -> Result<()> {
        let actual = self.compute_checksum();
        if actual != self.checksum {
            return Err(Error::Integrity {
                document: format!("citation {}", self.id),
                expected: self.checksum.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }

    /// Recompute and store the checksum after an intentional change.
    pub fn reseal(&mut self) {
        self.checksum = self.compute_checksum();
    }

    /// Sign this citation's ID and checksum.
    pub fn attest(&self, keypair: &Keypair) -> Attestation {
        let message = attestation_message(&self.id, &self.checksum);
        Attestation {
            citation_id: self.id.clone(),
            checksum: self.checksum,
            signer: keypair.public_key(),
            signature: keypair.sign(&message),
        }
    }
}

impl Serialize for Citation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Builder for new citations.
#[derive(Debug, Clone)]
pub struct CitationBuilder {
    id: CitationId,
    vault_id: VaultId,
    version: Version,
    created_at: Option<Timestamp>,
    predecessor: Option<CitationId>,
    successor: Option<CitationId>,
    constitutional_alignment: Option<ConstitutionalAlignment>,
    metadata: Option<Map<String, Value>>,
    extra: Map<String, Value>,
}

impl CitationBuilder {
    pub fn new(id: CitationId, vault_id: VaultId) -> Self {
        Self {
            id,
            vault_id,
            version: Version::default(),
            created_at: None,
            predecessor: None,
            successor: None,
            constitutional_alignment: None,
            metadata: None,
            extra: Map::new(),
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Set the creation time (defaults to now).
    pub fn created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn predecessor(mut self, predecessor: CitationId) -> Self {
        self.predecessor = Some(predecessor);
        self
    }

    pub fn successor(mut self, successor: CitationId) -> Self {
        self.successor = Some(successor);
        self
    }

    pub fn constitutional_alignment(mut self, alignment: ConstitutionalAlignment) -> Self {
        self.constitutional_alignment = Some(alignment);
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Add an unmodelled top-level field. Names the citation models itself are ignored.
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if KNOWN_FIELDS.contains(&key.as_str()) {
            tracing::warn!(%key, "ignoring extra citation field that shadows a known field");
        } else {
            self.extra.insert(key, value);
        }
        self
    }

    /// Seal the citation with its checksum.
    pub fn build(self) -> Citation {
        let mut citation = Citation {
            id: self.id,
            version: self.version,
            vault_id: self.vault_id,
            created_at: self.created_at.unwrap_or_else(Timestamp::now),
            predecessor: self.predecessor,
            successor: self.successor,
            constitutional_alignment: self.constitutional_alignment,
            metadata: self.metadata,
            extra: self.extra,
            checksum: Checksum::ZERO,
            omitted: Vec::new(),
        };
        citation.reseal();
        citation
    }
}

/// Create a sealed citation stamped with the current time. Nothing is written.
pub fn create_citation(id: CitationId, vault_id: VaultId, version: Version) -> Citation {
    CitationBuilder::new(id, vault_id).version(version).build()
}

/// Validate a parsed citation document and, when `verify` is set, check its
/// checksum against the document exactly as parsed.
pub fn parse_citation(value: &Value, document: &str, verify: bool) -> Result<Citation> {
    let citation = Citation::from_value(value).map_err(|e| Error::invalid(document, e))?;
    if verify {
        let actual = checksum(&strip_field(value, CHECKSUM_FIELD));
        if actual != citation.checksum {
            tracing::warn!(
                document,
                expected = %citation.checksum,
                actual = %actual,
                "citation checksum mismatch"
            );
            return Err(Error::Integrity {
                document: document.to_string(),
                expected: citation.checksum.to_hex(),
                actual: actual.to_hex(),
            });
        }
    }
    Ok(citation)
}

/// Load a citation from a JSON or YAML file.
pub fn load_citation(path: impl AsRef<Path>, verify: bool) -> Result<Citation> {
    let path = path.as_ref();
    let value = read_document(path, DocumentKind::Citation)?;
    let citation = parse_citation(&value, &path.display().to_string(), verify)?;
    tracing::info!(id = %citation.id, verified = verify, path = %path.display(), "loaded citation");
    Ok(citation)
}

/// Write a citation as JSON or YAML, chosen by the file extension.
pub fn save_citation(citation: &Citation, path: impl AsRef<Path>, pretty: bool) -> Result<()> {
    let path = path.as_ref();
    write_document(path, &citation.to_value(), Format::from_path(path), pretty)?;
    tracing::info!(id = %citation.id, path = %path.display(), "saved citation");
    Ok(())
}

/// Check the two-way link between consecutive citations.
pub fn validate_lineage(old: &Citation, new: &Citation) -> std::result::Result<(), LineageError> {
    for citation in [old, new] {
        check_self_reference(citation)?;
    }
    if old.id == new.id {
        return Err(LineageError::SelfReference(old.id.clone()));
    }
    if old.successor.as_ref() != Some(&new.id) {
        return Err(LineageError::SuccessorMismatch {
            old: old.id.clone(),
            expected: new.id.clone(),
            found: old.successor.clone(),
        });
    }
    if new.predecessor.as_ref() != Some(&old.id) {
        return Err(LineageError::PredecessorMismatch {
            new: new.id.clone(),
            expected: old.id.clone(),
            found: new.predecessor.clone(),
        });
    }
    Ok(())
}

/// Check a whole lineage, oldest first.
///
/// Every adjacent pair must be linked both ways, the head must have no
/// predecessor and the tail no successor.
pub fn validate_chain(chain: &[Citation]) -> std::result::Result<(), LineageError> {
    for (index, citation) in chain.iter().enumerate() {
        check_self_reference(citation).map_err(|e| LineageError::Broken {
            index,
            reason: e.to_string(),
        })?;
    }
    for (i, pair) in chain.windows(2).enumerate() {
        validate_lineage(&pair[0], &pair[1]).map_err(|e| LineageError::Broken {
            index: i + 1,
            reason: e.to_string(),
        })?;
    }
    if let Some(head) = chain.first() {
        if let Some(predecessor) = &head.predecessor {
            return Err(LineageError::Broken {
                index: 0,
                reason: format!("head {} has predecessor {}", head.id, predecessor),
            });
        }
    }
    if let Some(tail) = chain.last() {
        if let Some(successor) = &tail.successor {
            return Err(LineageError::Broken {
                index: chain.len() - 1,
                reason: format!("tail {} has successor {}", tail.id, successor),
            });
        }
    }
    Ok(())
}

fn check_self_reference(citation: &Citation) -> std::result::Result<(), LineageError> {
    let id = Some(&citation.id);
    if citation.predecessor.as_ref() == id || citation.successor.as_ref() == id {
        return Err(LineageError::SelfReference(citation.id.clone()));
    }
    Ok(())
}

/// Move an identity to a new citation (typically a new vault).
///
/// Returns `(old, new)`: the old citation re-sealed with `successor` set, and
/// the new one with `predecessor` set and the old binding recorded under
/// `metadata.migrated_from`. The input citation must verify and must not
/// already have a successor.
pub fn migrate(
    old: &Citation,
    new_id: CitationId,
    new_vault_id: VaultId,
    version: Version,
) -> Result<(Citation, Citation)> {
    old.verify_integrity()?;
    if new_id == old.id {
        return Err(LineageError::SelfReference(new_id).into());
    }
    if let Some(existing) = &old.successor {
        return Err(LineageError::SuccessorMismatch {
            old: old.id.clone(),
            expected: new_id,
            found: Some(existing.clone()),
        }
        .into());
    }

    let mut provenance = Map::new();
    provenance.insert(
        "migrated_from".into(),
        json!({
            "citation_id": old.id,
            "vault_id": old.vault_id,
            "checksum": old.checksum.to_hex(),
        }),
    );

    let mut builder = CitationBuilder::new(new_id, new_vault_id)
        .version(version)
        .predecessor(old.id.clone())
        .metadata(provenance);
    if let Some(alignment) = &old.constitutional_alignment {
        builder = builder.constitutional_alignment(alignment.clone());
    }
    let new = builder.build();

    let mut sealed_old = old.clone();
    sealed_old.successor = Some(new.id.clone());
    sealed_old.omitted.retain(|field| *field != SUCCESSOR);
    sealed_old.reseal();

    validate_lineage(&sealed_old, &new)?;
    tracing::info!(old = %sealed_old.id, new = %new.id, vault = %new.vault_id, "migrated citation");
    Ok((sealed_old, new))
}

/// A detached Ed25519 signature over a citation's ID and checksum.
///
/// Serializes as `{citation_id, checksum, signer, signature}` with hex text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub citation_id: CitationId,
    pub checksum: Checksum,
    pub signer: PublicKey,
    pub signature: Signature,
}

impl Attestation {
    /// Check that the attestation covers `citation` as it currently stands.
    pub fn verify(&self, citation: &Citation) -> Result<()> {
        let document = format!("attestation for {}", self.citation_id);
        if self.citation_id != citation.id || self.checksum != citation.checksum {
            return Err(Error::Integrity {
                document,
                expected: self.checksum.to_hex(),
                actual: citation.checksum.to_hex(),
            });
        }
        citation.verify_integrity()?;
        let message = attestation_message(&self.citation_id, &self.checksum);
        self.signer
            .verify(&message, &self.signature)
            .map_err(|e| Error::Integrity {
                document,
                expected: format!("signature by {}", self.signer),
                actual: e.to_string(),
            })
    }
}

fn attestation_message(id: &CitationId, checksum: &Checksum) -> Vec<u8> {
    let content = canonicalize(&json!({"checksum": checksum.to_hex(), "id": id}));
    let mut message = Vec::with_capacity(ATTEST_DOMAIN.len() + content.len());
    message.extend_from_slice(ATTEST_DOMAIN);
    message.extend_from_slice(&content);
    message
}
