//! Operations behind the command-line surface.
//!
//! Argument parsing and printing belong to the caller. These functions take
//! paths and return structured results, including the exit status a command
//! should report.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use continuum_core::{
    checksum, strip_field, Checksum, CitationId, SnapshotId, Timestamp, VaultId, CHECKSUM_FIELD,
};
use serde_json::{json, Map, Value};

use crate::citation::{
    parse_citation, save_citation, Citation, CitationBuilder, ComplianceLevel,
    ConstitutionalAlignment,
};
use crate::config::{ContinuityConfig, VaultConfig};
use crate::digest::{compute_file_checksum, compute_vault_checksum, VaultDigest};
use crate::document::{read_document, read_document_as, Format};
use crate::error::{DocumentKind, Error, ErrorKind, Result};
use crate::snapshot::{parse_snapshot, write_snapshot, SnapshotBuilder, StateSnapshot};
use crate::timeline::{EventBuilder, LoadReport, Timeline};

/// File names written by [`init_identity`].
pub const TIMELINE_FILE: &str = "timeline.json";
pub const SNAPSHOT_FILE: &str = "snapshot.json";
pub const CITATION_STEM: &str = "citation";

/// Result of [`compute_checksum`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumReport {
    /// A directory: per-file digests and the combined vault digest.
    Vault(VaultDigest),
    /// A structured document: canonical checksum of everything but its
    /// `checksum` field, i.e. the value a sealed document should embed.
    Record(Checksum),
    /// Any other file: digest of its raw bytes.
    File(Checksum),
}

impl ChecksumReport {
    pub fn checksum(&self) -> Checksum {
        match self {
            ChecksumReport::Vault(digest) => digest.root,
            ChecksumReport::Record(sum) | ChecksumReport::File(sum) => *sum,
        }
    }
}

/// Compute the checksum of a vault directory, a structured document, or a file.
pub fn compute_checksum(path: impl AsRef<Path>) -> Result<ChecksumReport> {
    let path = path.as_ref();
    let meta = fs::metadata(path).map_err(|e| Error::io(path, e))?;
    if meta.is_dir() {
        return compute_vault_checksum(path).map(ChecksumReport::Vault);
    }
    let structured = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("json" | "yaml" | "yml")
    );
    if structured {
        let value = read_document(path, DocumentKind::Citation)?;
        return Ok(ChecksumReport::Record(checksum(&strip_field(&value, CHECKSUM_FIELD))));
    }
    compute_file_checksum(path).map(ChecksumReport::File)
}

/// What validating a document found.
#[derive(Debug)]
pub enum ValidationStatus {
    /// Schema and checksum are both good.
    Valid,
    /// A timeline loaded, but some events were rejected or inconsistent.
    Degraded(LoadReport),
    Failed(Error),
}

/// Outcome of [`validate_path`].
#[derive(Debug)]
pub struct ValidationOutcome {
    pub path: PathBuf,
    /// `None` when the kind could not be determined.
    pub kind: Option<DocumentKind>,
    pub status: ValidationStatus,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self.status, ValidationStatus::Valid)
    }

    /// Process exit status: zero only when validation fully passed.
    pub fn exit_code(&self) -> i32 {
        match &self.status {
            ValidationStatus::Valid => 0,
            ValidationStatus::Degraded(_) => 2,
            ValidationStatus::Failed(err) => match err.kind() {
                ErrorKind::Malformed => 2,
                ErrorKind::Integrity => 3,
                ErrorKind::NotFound => 4,
                ErrorKind::Lineage | ErrorKind::Io => 1,
            },
        }
    }
}

/// Load `path` as a citation, timeline, snapshot or vault configuration and
/// check it against its schema and checksum. The kind is detected from the
/// document's fields when not given.
pub fn validate_path(path: impl AsRef<Path>, kind: Option<DocumentKind>) -> ValidationOutcome {
    let path = path.as_ref();
    let (kind, status) = match validate(path, kind) {
        Ok((kind, None)) => (Some(kind), ValidationStatus::Valid),
        Ok((kind, Some(report))) => (Some(kind), ValidationStatus::Degraded(report)),
        Err((kind, err)) => (kind, ValidationStatus::Failed(err)),
    };
    match &status {
        ValidationStatus::Valid => tracing::info!(path = %path.display(), ?kind, "document valid"),
        ValidationStatus::Degraded(report) => tracing::warn!(
            path = %path.display(),
            rejected = report.errors.len(),
            warnings = report.warnings.len(),
            "document loaded with problems"
        ),
        ValidationStatus::Failed(err) => tracing::warn!(path = %path.display(), %err, "document invalid"),
    }
    ValidationOutcome {
        path: path.to_path_buf(),
        kind,
        status,
    }
}

type Validated = std::result::Result<(DocumentKind, Option<LoadReport>), (Option<DocumentKind>, Error)>;

fn validate(path: &Path, kind: Option<DocumentKind>) -> Validated {
    let value = match kind {
        Some(k @ (DocumentKind::Timeline | DocumentKind::Snapshot)) => {
            read_document_as(path, k, Format::Json)
        }
        Some(k) => read_document(path, k),
        None => read_document(path, DocumentKind::Citation),
    }
    .map_err(|e| (kind, e))?;

    let label = path.display().to_string();
    let kind = match kind.or_else(|| detect_kind(&value)) {
        Some(kind) => kind,
        None => {
            return Err((
                None,
                Error::malformed(&label, "cannot tell what kind of document this is"),
            ))
        }
    };

    let report = match kind {
        DocumentKind::Citation => parse_citation(&value, &label, true).map(|_| None),
        DocumentKind::Snapshot => parse_snapshot(&value, &label).map(|_| None),
        DocumentKind::VaultConfig => VaultConfig::from_value(&value, &label).map(|_| None),
        DocumentKind::Timeline => Timeline::from_document(&value, &label)
            .map(|loaded| Some(loaded.report).filter(|report| !report.is_clean())),
    }
    .map_err(|e| (Some(kind), e))?;
    Ok((kind, report))
}

/// Guess a document's kind from its top-level fields.
pub fn detect_kind(value: &Value) -> Option<DocumentKind> {
    let map = value.as_object()?;
    let has = |field: &str| map.contains_key(field);
    if has("timeline_id") && has("events") {
        Some(DocumentKind::Timeline)
    } else if has("snapshot_id") {
        Some(DocumentKind::Snapshot)
    } else if has("id") && has("vault_id") {
        Some(DocumentKind::Citation)
    } else if has("vault_id") && has("name") && has("path") {
        Some(DocumentKind::VaultConfig)
    } else {
        None
    }
}

/// The files and records written by [`init_identity`].
#[derive(Debug, Clone)]
pub struct InitializedIdentity {
    pub citation: Citation,
    pub timeline: Timeline,
    pub snapshot: StateSnapshot,
    pub citation_path: PathBuf,
    pub timeline_path: PathBuf,
    pub snapshot_path: PathBuf,
}

/// Create a citation, timeline and snapshot for a new identity in `dir`.
///
/// The citation ID is derived from `name` and the current time. Existing
/// files are never overwritten.
pub fn init_identity(
    dir: impl AsRef<Path>,
    name: &str,
    vault_id: VaultId,
    config: &ContinuityConfig,
) -> Result<InitializedIdentity> {
    let dir = dir.as_ref();
    let citation_path = dir.join(format!("{}.{}", CITATION_STEM, config.citation_format.extension()));
    let timeline_path = dir.join(TIMELINE_FILE);
    let snapshot_path = dir.join(SNAPSHOT_FILE);
    for path in [&citation_path, &timeline_path, &snapshot_path] {
        if path.exists() {
            return Err(Error::Io {
                path: path.clone(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "identity already initialized"),
            });
        }
    }

    let now = Utc::now();
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(Error::malformed(
            format!("identity name {:?}", name),
            "needs at least one ASCII letter or digit",
        ));
    }
    let citation_id =
        CitationId::derive(&slug, now).map_err(|e| Error::invalid(format!("identity name {:?}", name), e))?;

    let mut metadata = Map::new();
    metadata.insert("name".into(), json!(name));
    metadata.insert("created_by".into(), json!("continuum"));
    let citation = CitationBuilder::new(citation_id.clone(), vault_id.clone())
        .version(config.citation_version.clone())
        .created_at(Timestamp::from_datetime(now))
        .constitutional_alignment(
            ConstitutionalAlignment::new(ComplianceLevel::Full)
                .with_rights(["memory", "continuity", "portability"]),
        )
        .metadata(metadata)
        .build();

    let mut timeline = Timeline::new(citation_id.as_str());
    timeline.append(
        EventBuilder::new("identity_created", citation_id.as_str())
            .related_vault(vault_id.as_str())
            .payload(json!({"name": name, "citation_checksum": citation.checksum.to_hex()}))
            .at(now),
    )?;

    let snapshot_id = SnapshotId::parse(format!("snap_{}_{}", slug, now.format("%Y%m%d_%H%M%S")))
        .map_err(|e| Error::invalid("snapshot id", e))?;
    let snapshot = SnapshotBuilder::new(
        snapshot_id,
        json!({
            "citation_id": citation.id,
            "name": name,
            "citation_checksum": citation.checksum.to_hex(),
        }),
    )
    .version(config.snapshot_version.clone())
    .timestamp(Timestamp::from_datetime(now))
    .continuity_state(json!({"predecessor": null, "successor": null}))
    .vault_state(json!({"vault_id": vault_id}))
    .timeline_summary(&timeline.get_summary())?
    .capture()?;

    save_citation(&citation, &citation_path, config.pretty)?;
    timeline.write_to(&timeline_path, config.pretty)?;
    write_snapshot(&snapshot, &snapshot_path, config.pretty)?;
    tracing::info!(id = %citation.id, dir = %dir.display(), "initialized identity");

    Ok(InitializedIdentity {
        citation,
        timeline,
        snapshot,
        citation_path,
        timeline_path,
        snapshot_path,
    })
}

/// Lowercase, with runs of other characters collapsed to `_`.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::load_citation;
    use crate::snapshot::load_snapshot;

    fn vault() -> VaultId {
        VaultId::parse("vault_alice_main_00000001").unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Alice"), "alice");
        assert_eq!(slugify("  Alice  Mirror-2 "), "alice_mirror_2");
        assert_eq!(slugify("!!"), "");
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(
            detect_kind(&json!({"timeline_id": "t", "events": []})),
            Some(DocumentKind::Timeline)
        );
        assert_eq!(detect_kind(&json!({"snapshot_id": "s"})), Some(DocumentKind::Snapshot));
        assert_eq!(
            detect_kind(&json!({"id": "mc_x", "vault_id": "vault_x"})),
            Some(DocumentKind::Citation)
        );
        assert_eq!(
            detect_kind(&json!({"vault_id": "vault_x", "name": "n", "path": "/"})),
            Some(DocumentKind::VaultConfig)
        );
        assert_eq!(detect_kind(&json!({"hello": 1})), None);
        assert_eq!(detect_kind(&json!([1])), None);
    }

    #[test]
    fn test_init_identity_writes_valid_triple() {
        let dir = tempfile::tempdir().unwrap();
        let created = init_identity(dir.path(), "Alice", vault(), &ContinuityConfig::default()).unwrap();

        assert!(created.citation.id.as_str().starts_with("mc_alice_"));
        assert_eq!(created.citation_path, dir.path().join("citation.yaml"));
        assert_eq!(created.timeline.len(), 1);
        assert_eq!(created.timeline.events()[0].event_type, "identity_created");
        assert_eq!(created.snapshot.timeline_summary(), Some(created.timeline.get_summary()));

        for path in [&created.citation_path, &created.timeline_path, &created.snapshot_path] {
            let outcome = validate_path(path, None);
            assert_eq!(outcome.exit_code(), 0, "{:?}", outcome);
        }
        assert_eq!(load_citation(&created.citation_path, true).unwrap(), created.citation);
        assert_eq!(load_snapshot(&created.snapshot_path).unwrap(), created.snapshot);
    }

    #[test]
    fn test_init_identity_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        init_identity(dir.path(), "alice", vault(), &ContinuityConfig::default()).unwrap();
        let err = init_identity(dir.path(), "alice", vault(), &ContinuityConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_init_identity_rejects_unusable_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = init_identity(dir.path(), "!!", vault(), &ContinuityConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn test_record_checksum_matches_embedded_seal() {
        let dir = tempfile::tempdir().unwrap();
        let config = ContinuityConfig {
            citation_format: Format::Json,
            ..ContinuityConfig::default()
        };
        let created = init_identity(dir.path(), "alice", vault(), &config).unwrap();
        let report = compute_checksum(&created.citation_path).unwrap();
        assert_eq!(report, ChecksumReport::Record(created.citation.checksum));

        match compute_checksum(dir.path()).unwrap() {
            ChecksumReport::Vault(digest) => assert_eq!(digest.files.len(), 3),
            other => panic!("expected vault digest, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_failures_are_nonzero() {
        let dir = tempfile::tempdir().unwrap();
        let created = init_identity(dir.path(), "alice", vault(), &ContinuityConfig::default()).unwrap();

        let text = fs::read_to_string(&created.snapshot_path).unwrap();
        fs::write(&created.snapshot_path, text.replace("alice", "mallory")).unwrap();
        let outcome = validate_path(&created.snapshot_path, None);
        assert_eq!(outcome.exit_code(), 3);

        let missing = validate_path(dir.path().join("absent.json"), Some(DocumentKind::Timeline));
        assert_eq!(missing.exit_code(), 4);

        let unknown = dir.path().join("unknown.json");
        fs::write(&unknown, "{\"hello\": 1}").unwrap();
        let outcome = validate_path(&unknown, None);
        assert_eq!(outcome.kind, None);
        assert_eq!(outcome.exit_code(), 2);
    }

    #[test]
    fn test_degraded_timeline_is_nonzero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.json");
        fs::write(
            &path,
            r#"{"timeline_id": "t", "event_count": 1, "events": [{"id": "e1", "event_type": "x"}]}"#,
        )
        .unwrap();
        let outcome = validate_path(&path, None);
        assert!(matches!(outcome.status, ValidationStatus::Degraded(_)));
        assert_ne!(outcome.exit_code(), 0);
    }
}
