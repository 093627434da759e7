//! Canonical JSON encoding for deterministic hashing.
//!
//! Every checksum in Continuum is computed over these bytes:
//! - Map keys sorted by their UTF-8 bytes (insertion order is irrelevant)
//! - Array order preserved
//! - No whitespace; `,` and `:` as the only separators
//! - Strings as raw UTF-8; only `"`, `\` and control characters are escaped
//! - Integers as plain decimal at any size; other numbers in shortest
//!   round-trip form
//!
//! **CRITICAL**: This encoding is FROZEN. Changing it invalidates every stored
//! checksum.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::Result;

/// Encode a structured record to canonical bytes.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value);
    buf
}

/// Encode a structured record to its canonical text.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    encode_value(&mut out, value);
    out
}

/// Convert any serializable record into the structured value the encoder works on.
pub fn to_canonical_value<T: Serialize + ?Sized>(record: &T) -> Result<Value> {
    Ok(serde_json::to_value(record)?)
}

/// Return a copy of `value` without the top-level `field`.
///
/// Non-mapping values are returned unchanged.
pub fn strip_field(value: &Value, field: &str) -> Value {
    match value {
        Value::Object(map) => {
            let stripped: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| k.as_str() != field)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(stripped)
        }
        other => other.clone(),
    }
}

/// Byte sink shared by the `Vec<u8>` and `String` front-ends.
trait Sink {
    fn push_str(&mut self, s: &str);
    fn push_char(&mut self, c: char);
}

impl Sink for Vec<u8> {
    fn push_str(&mut self, s: &str) {
        self.extend_from_slice(s.as_bytes());
    }

    fn push_char(&mut self, c: char) {
        let mut tmp = [0u8; 4];
        self.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
    }
}

impl Sink for String {
    fn push_str(&mut self, s: &str) {
        String::push_str(self, s);
    }

    fn push_char(&mut self, c: char) {
        self.push(c);
    }
}

/// Recursively encode a value.
fn encode_value<S: Sink>(buf: &mut S, value: &Value) {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => encode_number(buf, n),
        Value::String(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr),
        Value::Object(map) => encode_map(buf, map),
    }
}

fn encode_number<S: Sink>(buf: &mut S, n: &Number) {
    if let Some(i) = n.as_i64() {
        buf.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        buf.push_str(&u.to_string());
    } else {
        // Numbers keep their source text; integers wider than 64 bits are
        // written digit for digit, everything else is reduced to the
        // shortest form of its f64.
        let text = n.to_string();
        if is_integer_text(&text) {
            buf.push_str(&text);
        } else {
            match text.parse::<f64>().ok().and_then(Number::from_f64) {
                Some(shortest) => buf.push_str(&shortest.to_string()),
                None => buf.push_str(&text),
            }
        }
    }
}

fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn encode_text<S: Sink>(buf: &mut S, s: &str) {
    buf.push_char('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            '\u{08}' => buf.push_str("\\b"),
            '\u{0c}' => buf.push_str("\\f"),
            c if (c as u32) < 0x20 => buf.push_str(&format!("\\u{:04x}", c as u32)),
            c => buf.push_char(c),
        }
    }
    buf.push_char('"');
}

fn encode_array<S: Sink>(buf: &mut S, arr: &[Value]) {
    buf.push_char('[');
    for (i, item) in arr.iter().enumerate() {
        if i > 0 {
            buf.push_char(',');
        }
        encode_value(buf, item);
    }
    buf.push_char(']');
}

/// Encode a map with keys sorted by UTF-8 byte comparison.
fn encode_map<S: Sink>(buf: &mut S, map: &Map<String, Value>) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    buf.push_char('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            buf.push_char(',');
        }
        encode_text(buf, key);
        buf.push_char(':');
        encode_value(buf, value);
    }
    buf.push_char('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_deterministic() {
        let value = json!({"id": "test_001", "value": 42, "nested": {"key": "value"}});
        assert_eq!(canonicalize(&value), canonicalize(&value));
    }

    #[test]
    fn test_key_ordering() {
        let value = json!({"b": 2, "a": 1, "c": {"z": null, "y": [3, 2, 1]}});
        assert_eq!(
            canonical_string(&value),
            r#"{"a":1,"b":2,"c":{"y":[3,2,1],"z":null}}"#
        );
    }

    #[test]
    fn test_key_ordering_is_bytewise() {
        // Uppercase sorts before lowercase, multibyte after ASCII.
        let value = json!({"é": 1, "a": 2, "B": 3});
        assert_eq!(canonical_string(&value), "{\"B\":3,\"a\":2,\"é\":1}");
    }

    #[test]
    fn test_array_order_preserved() {
        assert_ne!(
            canonicalize(&json!([1, 2, 3])),
            canonicalize(&json!([3, 2, 1]))
        );
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(canonical_string(&json!({})), "{}");
        assert_eq!(canonical_string(&json!([])), "[]");
        assert_eq!(canonical_string(&json!("")), "\"\"");
    }

    #[test]
    fn test_string_escaping() {
        let value = json!("quote\" back\\ nl\n tab\t bell\u{07}");
        assert_eq!(
            canonical_string(&value),
            r#""quote\" back\\ nl\n tab\t bell\u0007""#
        );
    }

    #[test]
    fn test_non_ascii_is_raw_utf8() {
        let value = json!({"name": "héllo 世界"});
        let bytes = canonicalize(&value);
        assert_eq!(bytes, "{\"name\":\"héllo 世界\"}".as_bytes());
    }

    #[test]
    fn test_large_integers() {
        let value = json!({"max": u64::MAX, "min": i64::MIN});
        assert_eq!(
            canonical_string(&value),
            r#"{"max":18446744073709551615,"min":-9223372036854775808}"#
        );
    }

    #[test]
    fn test_integers_wider_than_64_bits_keep_their_digits() {
        let a: Value = serde_json::from_str(r#"{"n":18446744073709551616}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"n":18446744073709551617}"#).unwrap();
        let c: Value = serde_json::from_str(r#"{"n":-9223372036854775809}"#).unwrap();

        assert_eq!(canonical_string(&a), r#"{"n":18446744073709551616}"#);
        assert_eq!(canonical_string(&b), r#"{"n":18446744073709551617}"#);
        assert_eq!(canonical_string(&c), r#"{"n":-9223372036854775809}"#);
        assert_ne!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn test_floats_shortest_form() {
        assert_eq!(canonical_string(&json!(0.5)), "0.5");
        assert_eq!(canonical_string(&json!(0.95)), "0.95");

        let parsed: Value = serde_json::from_str("[1.50, 1e2, 2.5E-3]").unwrap();
        assert_eq!(canonical_string(&parsed), "[1.5,100.0,0.0025]");
    }

    #[test]
    fn test_deeply_nested() {
        let mut value = json!("leaf");
        for i in 0..64 {
            let mut map = Map::new();
            map.insert(format!("k{}", i), Value::Array(vec![value]));
            value = Value::Object(map);
        }
        let a = canonicalize(&value);
        let b = canonicalize(&value.clone());
        assert_eq!(a, b);
        assert!(a.starts_with(b"{\"k63\":[{\"k62\""));
    }

    #[test]
    fn test_strip_field() {
        let value = json!({"id": "x", "checksum": "abc"});
        assert_eq!(strip_field(&value, "checksum"), json!({"id": "x"}));
        assert_eq!(strip_field(&json!([1]), "checksum"), json!([1]));
    }

    #[test]
    fn test_string_and_bytes_agree() {
        let value = json!({"k": ["v", 1, true, null, {"n": -7}]});
        assert_eq!(canonical_string(&value).into_bytes(), canonicalize(&value));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_canonical_text_parses_back(s in ".{0,64}", n in any::<i64>()) {
                let value = json!({"s": s, "n": n, "list": [s.clone(), n]});
                let text = canonical_string(&value);
                let parsed: Value = serde_json::from_str(&text).unwrap();
                prop_assert_eq!(parsed, value);
                prop_assert!(!text.contains(' ') || s.contains(' '));
            }

            #[test]
            fn test_key_insertion_order_irrelevant(keys in prop::collection::vec("[a-zé]{1,4}", 1..10)) {
                let forward: Map<String, Value> =
                    keys.iter().map(|k| (k.clone(), json!(k.len()))).collect();
                let backward: Map<String, Value> =
                    keys.iter().rev().map(|k| (k.clone(), json!(k.len()))).collect();
                prop_assert_eq!(
                    canonicalize(&Value::Object(forward)),
                    canonicalize(&Value::Object(backward))
                );
            }
        }
    }
}
