//! Reading and writing structured documents.
//!
//! Citations and vault configuration may be JSON or YAML, chosen by file
//! extension. Timelines and snapshots are always JSON.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{DocumentKind, Error, Result};

/// On-disk encoding of a structured document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    /// `.yaml`/`.yml` select YAML; everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Format::Yaml
            }
            _ => Format::Json,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

/// Read `path` as a structured document in the format its extension names.
pub fn read_document(path: &Path, kind: DocumentKind) -> Result<Value> {
    read_document_as(path, kind, Format::from_path(path))
}

/// Read `path` as a structured document in an explicit format.
pub fn read_document_as(path: &Path, kind: DocumentKind, format: Format) -> Result<Value> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    tracing::debug!(path = %path.display(), %kind, bytes = bytes.len(), "read document");
    let text = String::from_utf8(bytes)
        .map_err(|e| Error::malformed(format!("{} {}", kind, path.display()), e))?;
    parse_document(&text, format)
        .map_err(|reason| Error::malformed(format!("{} {}", kind, path.display()), reason))
}

/// Parse document text. Returns the parser's message on failure.
pub fn parse_document(text: &str, format: Format) -> std::result::Result<Value, String> {
    match format {
        Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
    }
}

/// Render a document in the given format.
pub fn render_document(value: &Value, format: Format, pretty: bool) -> Result<String> {
    let rendered = match format {
        Format::Json if pretty => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        Format::Json => serde_json::to_string(value).map_err(|e| e.to_string()),
        Format::Yaml => yaml_value(value)
            .and_then(|yaml| serde_yaml::to_string(&yaml).map_err(|e| e.to_string())),
    };
    rendered.map_err(|reason| Error::malformed("document", reason))
}

/// Rebuild a structured value as YAML. Numbers are carried as their source
/// text, which the YAML emitter cannot see through, so each one is converted
/// explicitly.
fn yaml_value(value: &Value) -> std::result::Result<serde_yaml::Value, String> {
    Ok(match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Number(n) => {
            let number = if let Some(i) = n.as_i64() {
                serde_yaml::Number::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_yaml::Number::from(u)
            } else {
                let text = n.to_string();
                if !text.contains(['.', 'e', 'E']) {
                    return Err(format!("integer {} does not fit in 64 bits", text));
                }
                match n.as_f64() {
                    Some(f) => serde_yaml::Number::from(f),
                    None => return Err(format!("number {} is not representable", text)),
                }
            };
            serde_yaml::Value::Number(number)
        }
        Value::String(s) => serde_yaml::Value::String(s.clone()),
        Value::Array(items) => serde_yaml::Value::Sequence(
            items
                .iter()
                .map(yaml_value)
                .collect::<std::result::Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let mut mapping = serde_yaml::Mapping::new();
            for (key, item) in map {
                mapping.insert(serde_yaml::Value::String(key.clone()), yaml_value(item)?);
            }
            serde_yaml::Value::Mapping(mapping)
        }
    })
}

/// Write a document to `path`, creating parent directories as needed.
pub fn write_document(path: &Path, value: &Value, format: Format, pretty: bool) -> Result<()> {
    let mut text = render_document(value, format, pretty)?;
    if !text.ends_with('\n') {
        text.push('\n');
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, text).map_err(|e| Error::io(path, e))?;
    tracing::debug!(path = %path.display(), ?format, "wrote document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/citation.yaml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("citation.YML")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("citation.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("citation")), Format::Json);
    }

    #[test]
    fn test_yaml_and_json_agree() {
        let yaml = "id: mc_alice_primary_0000000001\ncount: 3\ntags:\n  - a\n  - b\nparent: null\n";
        let json = r#"{"parent": null, "tags": ["a", "b"], "count": 3, "id": "mc_alice_primary_0000000001"}"#;
        assert_eq!(
            parse_document(yaml, Format::Yaml).unwrap(),
            parse_document(json, Format::Json).unwrap()
        );
    }

    #[test]
    fn test_yaml_timestamps_stay_text() {
        let value = parse_document("created_at: 2025-11-14T10:00:00Z\n", Format::Yaml).unwrap();
        assert_eq!(value, json!({"created_at": "2025-11-14T10:00:00Z"}));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_document(&dir.path().join("absent.json"), DocumentKind::Timeline).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unparseable_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        let err = read_document(&path, DocumentKind::Snapshot).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn test_yaml_numbers_render_as_numbers() {
        let value = parse_document(r#"{"count": 3, "score": 0.95, "neg": -4}"#, Format::Json).unwrap();
        let text = render_document(&value, Format::Yaml, true).unwrap();
        assert!(text.contains("count: 3"), "{}", text);
        assert!(text.contains("score: 0.95"), "{}", text);
        assert_eq!(parse_document(&text, Format::Yaml).unwrap(), value);

        let wide = parse_document(r#"{"n": 18446744073709551616}"#, Format::Json).unwrap();
        let err = render_document(&wide, Format::Yaml, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.json");
        fs::write(&path, [0xff, 0xfe, b'{', b'}']).unwrap();
        let err = read_document(&path, DocumentKind::Citation).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let value = json!({"name": "héllo", "n": [1, 2, 3]});
        for (file, format) in [("nested/doc.json", Format::Json), ("doc.yaml", Format::Yaml)] {
            let path = dir.path().join(file);
            write_document(&path, &value, format, true).unwrap();
            assert_eq!(read_document(&path, DocumentKind::Citation).unwrap(), value);
        }
    }
}
