//! Checksummed point-in-time state snapshots.
//!
//! A snapshot owns copies of the state it was given and never changes after
//! capture. Loading always verifies the checksum.

use std::collections::BTreeMap;
use std::path::Path;

use continuum_core::validation::{
    as_mapping, require_checksum_text, require_snapshot_id, require_timestamp, require_version,
};
use continuum_core::{
    checksum, strip_field, Checksum, SnapshotId, Timestamp, ValidationError, Version,
    CHECKSUM_FIELD,
};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::document::{read_document_as, write_document, Format};
use crate::error::{DocumentKind, Error, Result};
use crate::timeline::TimelineSummary;

const IDENTITY_STATE: &str = "identity_state";
const CONTINUITY_STATE: &str = "continuity_state";
const VAULT_STATE: &str = "vault_state";
const TIMELINE_SUMMARY: &str = "timeline_summary";
const METADATA: &str = "metadata";

/// Fields the snapshot type models directly; anything else is carried in `extra`.
const KNOWN_FIELDS: [&str; 9] = [
    "snapshot_id",
    "timestamp",
    "version",
    IDENTITY_STATE,
    CONTINUITY_STATE,
    VAULT_STATE,
    TIMELINE_SUMMARY,
    METADATA,
    CHECKSUM_FIELD,
];

const OPTIONAL_FIELDS: [&str; 4] = [CONTINUITY_STATE, VAULT_STATE, TIMELINE_SUMMARY, METADATA];

/// Top-level sections compared by [`compare_snapshots`].
pub const SECTIONS: [&str; 4] = [IDENTITY_STATE, CONTINUITY_STATE, VAULT_STATE, TIMELINE_SUMMARY];

/// An immutable, checksummed capture of identity state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub snapshot_id: SnapshotId,
    pub timestamp: Timestamp,
    pub version: Version,
    pub identity_state: Value,
    pub continuity_state: Option<Value>,
    pub vault_state: Option<Value>,
    pub timeline_summary: Option<Value>,
    pub metadata: Option<Value>,
    /// Unmodelled top-level fields. They are part of the sealed form.
    pub extra: Map<String, Value>,
    pub checksum: Checksum,
    /// Optional sections the source document left out entirely.
    omitted: Vec<&'static str>,
}

impl StateSnapshot {
    /// Validate a parsed snapshot document. The checksum is not verified.
    pub fn from_value(value: &Value) -> std::result::Result<Self, ValidationError> {
        let map = as_mapping(value)?;
        let snapshot_id = require_snapshot_id(map, "snapshot_id")?;
        let timestamp = require_timestamp(map, "timestamp")?;
        let version = require_version(map, "version")?;
        let identity_state = map
            .get(IDENTITY_STATE)
            .cloned()
            .ok_or_else(|| ValidationError::MissingField(IDENTITY_STATE.to_string()))?;
        let checksum_text = require_checksum_text(map, CHECKSUM_FIELD)?;
        let checksum =
            Checksum::from_hex(checksum_text).map_err(|_| ValidationError::InvalidChecksum {
                field: CHECKSUM_FIELD.to_string(),
                value: checksum_text.to_string(),
            })?;
        let section = |name: &str| map.get(name).filter(|v| !v.is_null()).cloned();

        Ok(Self {
            snapshot_id,
            timestamp,
            version,
            identity_state,
            continuity_state: section(CONTINUITY_STATE),
            vault_state: section(VAULT_STATE),
            timeline_summary: section(TIMELINE_SUMMARY),
            metadata: section(METADATA),
            extra: map
                .iter()
                .filter(|(k, _)| !KNOWN_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            checksum,
            omitted: OPTIONAL_FIELDS
                .iter()
                .copied()
                .filter(|field| !map.contains_key(*field))
                .collect(),
        })
    }

    /// The sealed form: every field except `checksum`.
    pub fn unsealed_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert("snapshot_id".into(), Value::String(self.snapshot_id.to_string()));
        map.insert("timestamp".into(), Value::String(self.timestamp.as_str().to_string()));
        map.insert("version".into(), Value::String(self.version.to_string()));
        map.insert(IDENTITY_STATE.into(), self.identity_state.clone());

        let optional = [
            (CONTINUITY_STATE, &self.continuity_state),
            (VAULT_STATE, &self.vault_state),
            (TIMELINE_SUMMARY, &self.timeline_summary),
            (METADATA, &self.metadata),
        ];
        for (field, value) in optional {
            match value {
                Some(v) => {
                    map.insert(field.into(), v.clone());
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

    pub fn compute_checksum(&self) -> Checksum {
        checksum(&self.unsealed_value())
    }

    pub fn verify(&self) -> Result<()> {
        let actual = self.compute_checksum();
        if actual != self.checksum {
            return Err(Error::Integrity {
                document: format!("snapshot {}", self.snapshot_id),
                expected: self.checksum.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }

    /// The summary section, if it holds a timeline summary.
    pub fn timeline_summary(&self) -> Option<TimelineSummary> {
        self.timeline_summary
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn section(&self, name: &str) -> Option<&Value> {
        let value = match name {
            IDENTITY_STATE => Some(&self.identity_state),
            CONTINUITY_STATE => self.continuity_state.as_ref(),
            VAULT_STATE => self.vault_state.as_ref(),
            TIMELINE_SUMMARY => self.timeline_summary.as_ref(),
            _ => None,
        };
        value.filter(|v| !v.is_null())
    }
}

impl Serialize for StateSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Builder for [`StateSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    snapshot_id: SnapshotId,
    identity_state: Value,
    timestamp: Option<Timestamp>,
    version: Version,
    continuity_state: Option<Value>,
    vault_state: Option<Value>,
    timeline_summary: Option<Value>,
    metadata: Option<Value>,
}

impl SnapshotBuilder {
    pub fn new(snapshot_id: SnapshotId, identity_state: Value) -> Self {
        Self {
            snapshot_id,
            identity_state,
            timestamp: None,
            version: Version::default(),
            continuity_state: None,
            vault_state: None,
            timeline_summary: None,
            metadata: None,
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Set the capture time (defaults to now).
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn continuity_state(mut self, state: Value) -> Self {
        self.continuity_state = Some(state);
        self
    }

    pub fn vault_state(mut self, state: Value) -> Self {
        self.vault_state = Some(state);
        self
    }

    /// Use a summary computed elsewhere.
    pub fn timeline_summary_value(mut self, summary: Value) -> Self {
        self.timeline_summary = Some(summary);
        self
    }

    pub fn timeline_summary(self, summary: &TimelineSummary) -> Result<Self> {
        let value = serde_json::to_value(summary)
            .map_err(|e| Error::malformed("timeline summary", e))?;
        Ok(self.timeline_summary_value(value))
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Seal the snapshot.
    pub fn capture(self) -> Result<StateSnapshot> {
        let mut snapshot = StateSnapshot {
            snapshot_id: self.snapshot_id,
            timestamp: self.timestamp.unwrap_or_else(Timestamp::now),
            version: self.version,
            identity_state: self.identity_state,
            continuity_state: self.continuity_state,
            vault_state: self.vault_state,
            timeline_summary: self.timeline_summary,
            metadata: self.metadata,
            extra: Map::new(),
            checksum: Checksum::ZERO,
            omitted: Vec::new(),
        };
        snapshot.checksum = snapshot.compute_checksum();
        tracing::debug!(id = %snapshot.snapshot_id, checksum = ?snapshot.checksum, "captured snapshot");
        Ok(snapshot)
    }
}

/// Capture a snapshot of `identity_state` alone, stamped now.
pub fn capture_snapshot(snapshot_id: SnapshotId, identity_state: Value) -> Result<StateSnapshot> {
    SnapshotBuilder::new(snapshot_id, identity_state).capture()
}

pub fn save_snapshot(snapshot: &StateSnapshot, path: impl AsRef<Path>) -> Result<()> {
    write_snapshot(snapshot, path.as_ref(), true)
}

pub(crate) fn write_snapshot(snapshot: &StateSnapshot, path: &Path, pretty: bool) -> Result<()> {
    write_document(path, &snapshot.to_value(), Format::Json, pretty)?;
    tracing::info!(id = %snapshot.snapshot_id, path = %path.display(), "saved snapshot");
    Ok(())
}

/// Validate a parsed snapshot document and verify its checksum against the
/// document exactly as parsed.
pub fn parse_snapshot(value: &Value, document: &str) -> Result<StateSnapshot> {
    let snapshot = StateSnapshot::from_value(value).map_err(|e| Error::invalid(document, e))?;
    let actual = checksum(&strip_field(value, CHECKSUM_FIELD));
    if actual != snapshot.checksum {
        tracing::warn!(
            document,
            expected = %snapshot.checksum,
            actual = %actual,
            "snapshot checksum mismatch"
        );
        return Err(Error::Integrity {
            document: document.to_string(),
            expected: snapshot.checksum.to_hex(),
            actual: actual.to_hex(),
        });
    }
    Ok(snapshot)
}

/// Load a snapshot file. The checksum is always verified.
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<StateSnapshot> {
    let path = path.as_ref();
    let value = read_document_as(path, DocumentKind::Snapshot, Format::Json)?;
    let snapshot = parse_snapshot(&value, &path.display().to_string())?;
    tracing::info!(id = %snapshot.snapshot_id, path = %path.display(), "loaded snapshot");
    Ok(snapshot)
}

/// A changed value, before and after.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueChange {
    pub before: Value,
    pub after: Value,
}

/// Structural difference between two snapshots, keyed by dotted path
/// (`identity_state.name`). A `.` or `\` inside a key is written with a
/// leading `\`, so `{"a.b": 1}` is `a\.b` and `{"a": {"b": 1}}` is `a.b`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotDiff {
    pub checksum_changed: bool,
    pub added: BTreeMap<String, Value>,
    pub removed: BTreeMap<String, Value>,
    pub changed: BTreeMap<String, ValueChange>,
}

impl SnapshotDiff {
    /// No section differs. The checksums may still differ through metadata,
    /// timestamp or ID.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Top-level sections with at least one difference, in section order.
    pub fn changed_sections(&self) -> Vec<&'static str> {
        let paths = self
            .added
            .keys()
            .chain(self.removed.keys())
            .chain(self.changed.keys());
        let touched: Vec<&str> = paths
            .map(|p| p.split('.').next().unwrap_or(p.as_str()))
            .collect();
        SECTIONS
            .iter()
            .copied()
            .filter(|s| touched.contains(s))
            .collect()
    }
}

/// Explain how `b` differs from `a` across the state sections.
pub fn compare_snapshots(a: &StateSnapshot, b: &StateSnapshot) -> SnapshotDiff {
    let mut diff = SnapshotDiff {
        checksum_changed: a.checksum != b.checksum,
        ..SnapshotDiff::default()
    };
    for section in SECTIONS {
        diff_value(section.to_string(), a.section(section), b.section(section), &mut diff);
    }
    diff
}

fn diff_value(path: String, before: Option<&Value>, after: Option<&Value>, diff: &mut SnapshotDiff) {
    match (before, after) {
        (None, None) => {}
        (None, Some(v)) => {
            diff.added.insert(path, v.clone());
        }
        (Some(v), None) => {
            diff.removed.insert(path, v.clone());
        }
        (Some(Value::Object(a)), Some(Value::Object(b))) => diff_maps(&path, a, b, diff),
        (Some(a), Some(b)) if a != b => {
            diff.changed.insert(
                path,
                ValueChange {
                    before: a.clone(),
                    after: b.clone(),
                },
            );
        }
        _ => {}
    }
}

fn diff_maps(prefix: &str, a: &Map<String, Value>, b: &Map<String, Value>, diff: &mut SnapshotDiff) {
    let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
    keys.sort();
    keys.dedup();
    for key in keys {
        diff_value(child_path(prefix, key), a.get(key), b.get(key), diff);
    }
}

fn child_path(prefix: &str, key: &str) -> String {
    let mut path = String::with_capacity(prefix.len() + key.len() + 1);
    path.push_str(prefix);
    path.push('.');
    for c in key.chars() {
        if c == '.' || c == '\\' {
            path.push('\\');
        }
        path.push(c);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn snap(id: &str, identity: Value) -> SnapshotBuilder {
        SnapshotBuilder::new(SnapshotId::parse(id).unwrap(), identity)
            .timestamp(Timestamp::parse("2025-11-14T10:00:00Z").unwrap())
    }

    #[test]
    fn test_capture_seals_with_null_sections() {
        let snapshot = snap("snap_001", json!({"name": "alice"})).capture().unwrap();
        snapshot.verify().unwrap();
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["vault_state"], Value::Null);
        assert_eq!(value["version"], json!("1.0.0"));
    }

    #[test]
    fn test_mutation_breaks_integrity() {
        let mut snapshot = snap("snap_001", json!({"name": "alice"})).capture().unwrap();
        snapshot.identity_state["name"] = json!("mallory");
        assert_eq!(snapshot.verify().unwrap_err().kind(), ErrorKind::Integrity);
    }

    #[test]
    fn test_parse_verifies() {
        let snapshot = snap("snap_001", json!({"name": "alice"}))
            .continuity_state(json!({"sessions": 3}))
            .capture()
            .unwrap();
        let mut value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(parse_snapshot(&value, "mem").unwrap(), snapshot);

        value["continuity_state"]["sessions"] = json!(4);
        assert!(parse_snapshot(&value, "mem").unwrap_err().is_integrity());

        value.as_object_mut().unwrap().remove("checksum");
        assert!(parse_snapshot(&value, "mem").unwrap_err().is_malformed());
    }

    #[test]
    fn test_foreign_document_shape_survives() {
        let mut unsealed = json!({
            "snapshot_id": "snap_001",
            "timestamp": "2025-11-14T10:00:00+00:00",
            "version": "1.0.0",
            "identity_state": {"name": "alice"},
            "continuity_state": null,
            "captured_by": "importer"
        });
        unsealed["checksum"] = json!(checksum(&unsealed).to_hex());

        let snapshot = parse_snapshot(&unsealed, "mem").unwrap();
        snapshot.verify().unwrap();
        assert_eq!(snapshot.extra["captured_by"], json!("importer"));
        assert_eq!(snapshot.vault_state, None);
        assert_eq!(snapshot.to_value(), unsealed);
        assert!(snapshot.to_value().get("vault_state").is_none());
        assert_eq!(snapshot.to_value()["continuity_state"], Value::Null);
    }

    #[test]
    fn test_embeds_timeline_summary() {
        let mut timeline = crate::timeline::Timeline::new("mc_alice_primary_0000000001");
        timeline.append_event("session_start", "agent", None).unwrap();
        let summary = timeline.get_summary();
        let snapshot = snap("snap_001", json!({}))
            .timeline_summary(&summary)
            .unwrap()
            .capture()
            .unwrap();
        assert_eq!(snapshot.timeline_summary(), Some(summary));
    }

    #[test]
    fn test_compare_paths() {
        let a = snap("snap_001", json!({"name": "alice", "traits": {"tone": "calm", "age": 1}}))
            .vault_state(json!({"entries": 3}))
            .capture()
            .unwrap();
        let b = snap("snap_002", json!({"name": "alice", "traits": {"tone": "warm"}, "role": "guide"}))
            .continuity_state(json!({"sessions": 1}))
            .capture()
            .unwrap();

        let diff = compare_snapshots(&a, &b);
        assert!(diff.checksum_changed);
        assert_eq!(diff.added["identity_state.role"], json!("guide"));
        assert_eq!(diff.added["continuity_state"], json!({"sessions": 1}));
        assert_eq!(diff.removed["identity_state.traits.age"], json!(1));
        assert_eq!(diff.removed["vault_state"], json!({"entries": 3}));
        assert_eq!(
            diff.changed["identity_state.traits.tone"],
            ValueChange {
                before: json!("calm"),
                after: json!("warm")
            }
        );
        assert_eq!(
            diff.changed_sections(),
            vec!["identity_state", "continuity_state", "vault_state"]
        );
    }

    #[test]
    fn test_compare_keeps_dotted_keys_apart() {
        let a = snap("snap_001", json!({"a.b": 1, "a": {"b": 1}})).capture().unwrap();
        let b = snap("snap_002", json!({"a.b": 2, "a": {"b": 3}})).capture().unwrap();

        let diff = compare_snapshots(&a, &b);
        assert_eq!(diff.changed.len(), 2);
        assert_eq!(diff.changed["identity_state.a\\.b"].after, json!(2));
        assert_eq!(diff.changed["identity_state.a.b"].after, json!(3));
        assert_eq!(diff.changed_sections(), vec!["identity_state"]);

        let slashed = snap("snap_003", json!({"x\\": {"y": 1}})).capture().unwrap();
        let plain = snap("snap_004", json!({})).capture().unwrap();
        let diff = compare_snapshots(&plain, &slashed);
        assert!(diff.added.contains_key("identity_state.x\\\\"));
    }

    #[test]
    fn test_compare_identical_state() {
        let a = snap("snap_001", json!({"name": "alice"})).capture().unwrap();
        let b = snap("snap_002", json!({"name": "alice"})).capture().unwrap();
        let diff = compare_snapshots(&a, &b);
        assert!(diff.is_empty());
        assert!(diff.checksum_changed);
        assert!(compare_snapshots(&a, &a).changed_sections().is_empty());
    }
}
