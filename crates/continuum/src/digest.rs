//! Digests of files and whole vault directories.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use continuum_core::{checksum_bytes, checksum_text, Checksum};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Extensions whose content is normalized before hashing.
pub const TEXT_EXTENSIONS: [&str; 7] = ["txt", "md", "json", "yaml", "yml", "py", "js"];

/// SHA-256 of a file's raw bytes.
pub fn compute_file_checksum(path: impl AsRef<Path>) -> Result<Checksum> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(checksum_bytes(&bytes))
}

/// Per-file digests of a vault and the digest over all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultDigest {
    pub root: Checksum,
    /// Keyed by `/`-separated path relative to the vault directory.
    pub files: BTreeMap<String, Checksum>,
}

/// Hash every file under `dir`.
///
/// Text files have line endings normalized to LF and trailing whitespace
/// removed from each line, so the digest survives editor round trips. The
/// root digest is SHA-256 over `"<path>:<hex>"` lines joined by `\n`, in path
/// order.
pub fn compute_vault_checksum(dir: impl AsRef<Path>) -> Result<VaultDigest> {
    let dir = dir.as_ref();
    let meta = fs::metadata(dir).map_err(|e| Error::io(dir, e))?;
    if !meta.is_dir() {
        return Err(Error::malformed(dir.display(), "not a directory"));
    }

    let mut files = BTreeMap::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            match e.into_io_error() {
                Some(source) => Error::io(&path, source),
                None => Error::malformed(path.display(), "filesystem loop"),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = relative_key(dir, entry.path())?;
        let bytes = fs::read(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
        let digest = if is_text_file(entry.path()) {
            checksum_bytes(&normalize_text(bytes))
        } else {
            checksum_bytes(&bytes)
        };
        tracing::trace!(file = %relative, digest = %digest, "hashed vault file");
        files.insert(relative, digest);
    }

    if files.is_empty() {
        return Err(Error::malformed(dir.display(), "no files found in vault"));
    }

    let combined = files
        .iter()
        .map(|(path, digest)| format!("{}:{}", path, digest.to_hex()))
        .collect::<Vec<_>>()
        .join("\n");
    let root = checksum_text(&combined);
    tracing::info!(vault = %dir.display(), files = files.len(), root = %root, "computed vault digest");
    Ok(VaultDigest { root, files })
}

fn relative_key(dir: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(dir)
        .map_err(|_| Error::malformed(path.display(), "outside the vault directory"))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| TEXT_EXTENSIONS.contains(&ext))
}

/// Normalize line endings and strip trailing whitespace. Content that is not
/// UTF-8 is returned unchanged.
pub fn normalize_text(bytes: Vec<u8>) -> Vec<u8> {
    match String::from_utf8(bytes) {
        Ok(text) => text
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .split('\n')
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes(),
        Err(e) => e.into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text(b"a  \r\nb\rc\t\n".to_vec()), b"a\nb\nc\n".to_vec());
        let binary = vec![0xff, 0xfe, b' ', b'\r'];
        assert_eq!(normalize_text(binary.clone()), binary);
    }

    #[test]
    fn test_line_endings_do_not_change_vault_digest() {
        let unix = tempfile::tempdir().unwrap();
        let dos = tempfile::tempdir().unwrap();
        fs::write(unix.path().join("notes.md"), "line one\nline two\n").unwrap();
        fs::write(dos.path().join("notes.md"), "line one  \r\nline two\r\n").unwrap();
        assert_eq!(
            compute_vault_checksum(unix.path()).unwrap().root,
            compute_vault_checksum(dos.path()).unwrap().root
        );
    }

    #[test]
    fn test_vault_digest_layout() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.bin"), [1u8, 2, 3]).unwrap();
        fs::write(dir.path().join("sub").join("a.txt"), "hi").unwrap();

        let digest = compute_vault_checksum(dir.path()).unwrap();
        let keys: Vec<_> = digest.files.keys().cloned().collect();
        assert_eq!(keys, vec!["b.bin".to_string(), "sub/a.txt".to_string()]);

        let expected = checksum_text(&format!(
            "b.bin:{}\nsub/a.txt:{}",
            checksum_bytes(&[1, 2, 3]).to_hex(),
            checksum_text("hi").to_hex()
        ));
        assert_eq!(digest.root, expected);
    }

    #[test]
    fn test_empty_vault_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let err = compute_vault_checksum(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn test_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent");
        assert_eq!(compute_vault_checksum(&absent).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(compute_file_checksum(&absent).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_file_checksum_is_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "x \r\n").unwrap();
        assert_eq!(compute_file_checksum(&path).unwrap(), checksum_bytes(b"x \r\n"));
    }
}
