//! On-disk collection files.
//!
//! Each collection lives in `<root>/<collection>.json` as a pretty-printed
//! JSON array. Every mutation rewrites the whole file.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File extension for collection files.
pub const COLLECTION_EXT: &str = "json";

/// Reject names that would escape the root or are not usable as a file stem.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if unsafe_name {
        return Err(Error::InvalidCollection(name.to_string()));
    }
    Ok(())
}

/// Location of a single collection's backing file.
#[derive(Debug, Clone)]
pub struct CollectionFile {
    name: String,
    path: PathBuf,
}

impl CollectionFile {
    /// Resolve the file for `name` under `root`. The name must be valid.
    pub fn new(root: &Path, name: &str) -> Result<Self> {
        validate_collection_name(name)?;
        Ok(Self {
            name: name.to_string(),
            path: root.join(format!("{}.{}", name, COLLECTION_EXT)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_file_name(format!(".{}.{}.tmp", self.name, COLLECTION_EXT))
    }

    /// Read the collection, creating the file as `[]` first if it is absent.
    pub fn read_or_create<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            fs::write(&self.path, "[]")?;
            tracing::debug!("Created collection file: {}", self.path.display());
        }

        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|source| Error::Parse {
            collection: self.name.clone(),
            source,
        })
    }

    /// Overwrite the file with the full record sequence.
    pub fn write<T: Serialize>(&self, records: &[T], indent: usize, atomic: bool) -> Result<()> {
        let content = encode_pretty(records, indent)?;

        if atomic {
            let tmp_path = self.tmp_path();
            fs::write(&tmp_path, &content)?;
            if let Err(e) = fs::rename(&tmp_path, &self.path) {
                fs::remove_file(&tmp_path).ok();
                return Err(e.into());
            }
        } else {
            fs::write(&self.path, &content)?;
        }
        Ok(())
    }
}

/// Serialize records as a JSON array with the given indent width.
pub fn encode_pretty<T: Serialize>(records: &[T], indent: usize) -> Result<Vec<u8>> {
    let indent = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    records.serialize(&mut ser)?;
    Ok(out)
}

/// Sorted stems of the collection files present in `root`.
pub fn list_collection_files(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() || path.extension().map_or(true, |ext| ext != COLLECTION_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn test_validate_collection_name() {
        for ok in ["users", "user-events", "a.b", "日本"] {
            assert!(validate_collection_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", ".", "..", "../etc", "a/b", "a\\b", "nul\0"] {
            assert!(
                matches!(validate_collection_name(bad), Err(Error::InvalidCollection(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_read_or_create_materializes_empty_array() {
        let temp_dir = TempDir::new().unwrap();
        let file = CollectionFile::new(temp_dir.path(), "users").unwrap();

        let records: Vec<Value> = file.read_or_create().unwrap();
        assert!(records.is_empty());
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "[]");
    }

    #[test]
    fn test_read_rejects_non_array() {
        let temp_dir = TempDir::new().unwrap();
        let file = CollectionFile::new(temp_dir.path(), "users").unwrap();
        fs::write(file.path(), r#"{"a": 1}"#).unwrap();

        let err = file.read_or_create::<Value>().unwrap_err();
        assert!(matches!(err, Error::Parse { ref collection, .. } if collection == "users"));
    }

    #[test]
    fn test_write_uses_two_space_indent() {
        let temp_dir = TempDir::new().unwrap();
        let file = CollectionFile::new(temp_dir.path(), "users").unwrap();

        file.write(&[json!({"a": 1})], 2, false).unwrap();
        assert_eq!(
            fs::read_to_string(file.path()).unwrap(),
            "[\n  {\n    \"a\": 1\n  }\n]"
        );
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = CollectionFile::new(temp_dir.path(), "users").unwrap();

        file.write(&[json!({"a": 1}), json!({"a": 2})], 2, true).unwrap();

        let back: Vec<Value> = file.read_or_create().unwrap();
        assert_eq!(back, vec![json!({"a": 1}), json!({"a": 2})]);
        assert!(!file.tmp_path().exists());
    }

    #[test]
    fn test_list_collection_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.json"), "[]").unwrap();
        fs::write(temp_dir.path().join("a.json"), "[]").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "").unwrap();
        fs::write(temp_dir.path().join(".c.json.tmp"), "[]").unwrap();
        fs::write(temp_dir.path().join(".hidden.json"), "[]").unwrap();
        fs::create_dir(temp_dir.path().join("d.json")).unwrap();

        assert_eq!(
            list_collection_files(temp_dir.path()).unwrap(),
            vec![".hidden", "a", "b"]
        );
    }
}
