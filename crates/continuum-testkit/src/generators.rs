//! Proptest generators for property-based testing.

use proptest::prelude::*;

use continuum_core::{CitationId, Map, Value, VaultId};

/// Generate a mapping key, ASCII and non-ASCII.
pub fn key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z_][a-z0-9_]{0,12}".prop_map(String::from),
        "[A-Za-zé世🦀]{1,6}".prop_map(String::from),
    ]
}

/// Generate a scalar. Floats are left out: checksum-bearing documents keep to
/// integers.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        ".{0,24}".prop_map(Value::String),
    ]
}

/// Generate a nested structured record (mappings, sequences, scalars).
pub fn record() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::btree_map(key(), inner, 0..8)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate a top-level mapping with at least one field.
pub fn mapping() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(key(), record(), 1..8).prop_map(|m| m.into_iter().collect())
}

/// Rebuild every mapping in `value` with its keys inserted in a different order.
///
/// `rotation` picks where insertion starts, so the logical value is unchanged.
pub fn reorder_keys(value: &Value, rotation: usize) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.reverse();
            if !entries.is_empty() {
                let len = entries.len();
                entries.rotate_left(rotation % len);
            }
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), reorder_keys(v, rotation)))
                    .collect(),
            )
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| reorder_keys(v, rotation)).collect())
        }
        other => other.clone(),
    }
}

/// Generate a valid citation ID.
pub fn citation_id() -> impl Strategy<Value = CitationId> {
    "mc_[a-z0-9_]{16,32}".prop_map(|s| CitationId::parse(s).expect("pattern matches"))
}

/// Generate a valid vault ID.
pub fn vault_id() -> impl Strategy<Value = VaultId> {
    "vault_[a-z0-9_]{1,24}".prop_map(|s| VaultId::parse(s).expect("pattern matches"))
}

/// Generate an event type.
pub fn event_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("session_start".to_string()),
        Just("memory_created".to_string()),
        Just("session_end".to_string()),
        "[a-z]{1,8}_[a-z]{1,8}".prop_map(String::from),
    ]
}
