//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical encoding and its SHA-256 digest. Any
//! implementation that reads the same input must produce the same canonical
//! text and checksum.

use continuum_core::{canonical_string, checksum, Value};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Input document as written (key order and spacing deliberately varied).
    pub input: &'static str,
    /// Expected canonical text.
    pub canonical: &'static str,
    /// Expected lowercase hex SHA-256 of the canonical text.
    pub checksum: &'static str,
}

impl GoldenVector {
    /// Parse the input document.
    pub fn value(&self) -> Value {
        serde_json::from_str(self.input)
            .unwrap_or_else(|e| panic!("vector '{}' has invalid input: {}", self.name, e))
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "empty mapping",
            input: "{ }",
            canonical: "{}",
            checksum: "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a",
        },
        GoldenVector {
            name: "key order",
            input: r#"{"b": 2, "a": 1}"#,
            canonical: r#"{"a":1,"b":2}"#,
            checksum: "43258cff783fe7036d8a43033f830adfc60ec037382473548ac742b888292777",
        },
        GoldenVector {
            name: "nested with null and booleans",
            input: r#"{"tags": ["b", "a"], "meta": {"z": null, "y": true, "x": false}, "id": "mc_alice_primary_0000000001"}"#,
            canonical: r#"{"id":"mc_alice_primary_0000000001","meta":{"x":false,"y":true,"z":null},"tags":["b","a"]}"#,
            checksum: "e4e0df9622c8ae1f8ca86979386fb23ce56d24374940aa6782a087efeb7cfba0",
        },
        GoldenVector {
            name: "non-ASCII text",
            input: r#"{"name": "héllo 世界", "emoji": "🦀", "B": 1}"#,
            canonical: r#"{"B":1,"emoji":"🦀","name":"héllo 世界"}"#,
            checksum: "0c3a1eb4b5fa01a5b26a3f923866376aa4f0f3e620b4fdf3eccef4dea3a87954",
        },
        GoldenVector {
            name: "string escapes",
            input: r#"{"text": "line1\nline2\t\"q\" \\ \u0001"}"#,
            canonical: r#"{"text":"line1\nline2\t\"q\" \\ \u0001"}"#,
            checksum: "4407120480ecaa005368b7ee02ac895ab309845b69e1f3971102d069f5f34d2b",
        },
        GoldenVector {
            name: "numbers",
            input: r#"{"zero": 0, "neg": -9223372036854775808, "list": [3, 2, 1], "half": 0.5, "big": 18446744073709551615}"#,
            canonical: r#"{"big":18446744073709551615,"half":0.5,"list":[3,2,1],"neg":-9223372036854775808,"zero":0}"#,
            checksum: "7eb89c3150be522ab44e717416f5f695c2beb33b47ac31fa4e794e59d73cf9bd",
        },
        GoldenVector {
            name: "unsealed citation",
            input: r#"{
                "id": "mc_alice_primary_0000000001",
                "version": "1.0.0",
                "vault_id": "vault_alice_main_00000001",
                "created_at": "2025-11-14T10:00:00Z",
                "predecessor": null,
                "successor": null,
                "constitutional_alignment": null,
                "metadata": null
            }"#,
            canonical: r#"{"constitutional_alignment":null,"created_at":"2025-11-14T10:00:00Z","id":"mc_alice_primary_0000000001","metadata":null,"predecessor":null,"successor":null,"vault_id":"vault_alice_main_00000001","version":"1.0.0"}"#,
            checksum: "4e8a6554fd1db6a0365d2c347d2590bcff6b37295a22dbbf61952beea9322060",
        },
    ]
}

/// Check every vector against this implementation.
///
/// Returns `(name, matches, computed checksum)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let value = v.value();
            let hex = checksum(&value).to_hex();
            let matches = canonical_string(&value) == v.canonical && hex == v.checksum;
            (v.name.to_string(), matches, hex)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use continuum_core::checksum_text;

    #[test]
    fn test_expected_checksums_hash_expected_text() {
        for vector in all_vectors() {
            assert_eq!(
                checksum_text(vector.canonical).to_hex(),
                vector.checksum,
                "vector '{}' is internally inconsistent",
                vector.name
            );
        }
    }

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, hex) in verify_all_vectors() {
            assert!(matches, "vector '{}' produced {}", name, hex);
        }
    }
}
