//! Structural validation of raw documents.
//!
//! These checks run on the parsed document before it is turned into a typed
//! record, so that a caller learns exactly which field is wrong instead of
//! getting a generic deserialization failure.

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::types::{CitationId, EventId, EventType, SnapshotId, Timestamp, VaultId, Version};

/// Require the document to be a mapping.
pub fn as_mapping(value: &Value) -> Result<&Map<String, Value>, ValidationError> {
    value.as_object().ok_or(ValidationError::NotAMapping)
}

/// Require `field` to be present and a string.
pub fn require_str<'a>(map: &'a Map<String, Value>, field: &str) -> Result<&'a str, ValidationError> {
    match map.get(field) {
        None => Err(ValidationError::MissingField(field.to_string())),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::WrongType {
            field: field.to_string(),
            expected: "a string",
        }),
    }
}

/// Require `field` to be present, a string, and not blank.
pub fn require_non_empty<'a>(
    map: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a str, ValidationError> {
    let s = require_str(map, field)?;
    if s.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: field.to_string(),
        });
    }
    Ok(s)
}

/// Read an optional string field; `null` counts as absent.
pub fn optional_str<'a>(
    map: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a str>, ValidationError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ValidationError::WrongType {
            field: field.to_string(),
            expected: "a string or null",
        }),
    }
}

/// Read an optional mapping field; `null` counts as absent.
pub fn optional_mapping<'a>(
    map: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a Map<String, Value>>, ValidationError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(m)) => Ok(Some(m)),
        Some(_) => Err(ValidationError::WrongType {
            field: field.to_string(),
            expected: "a mapping or null",
        }),
    }
}

/// Read an optional list of strings; `null` counts as absent.
pub fn optional_str_list(
    map: &Map<String, Value>,
    field: &str,
) -> Result<Option<Vec<String>>, ValidationError> {
    let items = match map.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationError::WrongType {
                field: field.to_string(),
                expected: "a list of strings",
            })
        }
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            _ => Err(ValidationError::WrongType {
                field: field.to_string(),
                expected: "a list of strings",
            }),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

pub fn require_citation_id(map: &Map<String, Value>, field: &str) -> Result<CitationId, ValidationError> {
    CitationId::parse(require_str(map, field)?).map_err(|e| e.with_field(field))
}

pub fn optional_citation_id(
    map: &Map<String, Value>,
    field: &str,
) -> Result<Option<CitationId>, ValidationError> {
    optional_str(map, field)?
        .map(|s| CitationId::parse(s).map_err(|e| e.with_field(field)))
        .transpose()
}

pub fn require_vault_id(map: &Map<String, Value>, field: &str) -> Result<VaultId, ValidationError> {
    VaultId::parse(require_str(map, field)?).map_err(|e| e.with_field(field))
}

pub fn require_version(map: &Map<String, Value>, field: &str) -> Result<Version, ValidationError> {
    Version::parse(require_str(map, field)?).map_err(|e| e.with_field(field))
}

pub fn require_timestamp(map: &Map<String, Value>, field: &str) -> Result<Timestamp, ValidationError> {
    Timestamp::parse(require_str(map, field)?).map_err(|e| e.with_field(field))
}

pub fn require_event_id(map: &Map<String, Value>, field: &str) -> Result<EventId, ValidationError> {
    EventId::parse(require_str(map, field)?).map_err(|e| e.with_field(field))
}

pub fn require_event_type(map: &Map<String, Value>, field: &str) -> Result<EventType, ValidationError> {
    EventType::parse(require_str(map, field)?).map_err(|e| e.with_field(field))
}

pub fn require_snapshot_id(map: &Map<String, Value>, field: &str) -> Result<SnapshotId, ValidationError> {
    SnapshotId::parse(require_str(map, field)?).map_err(|e| e.with_field(field))
}

/// Require `field` to hold checksum text: exactly 64 hex characters.
pub fn require_checksum_text<'a>(
    map: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a str, ValidationError> {
    let s = require_str(map, field)?;
    if !is_checksum_text(s) {
        return Err(ValidationError::InvalidChecksum {
            field: field.to_string(),
            value: s.to_string(),
        });
    }
    Ok(s)
}

/// Whether `s` looks like a hex SHA-256 digest (either case).
pub fn is_checksum_text(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}
