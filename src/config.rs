//! Store configuration for RonyBase.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the storage directory under the working directory.
pub const DEFAULT_ROOT_DIR: &str = "db";

/// Store configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoreConfig {
    /// Directory holding one `<collection>.json` file per collection.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Pretty-print indent width used when rewriting collection files.
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Write to a temp file and rename over the target instead of
    /// rewriting the file in place.
    #[serde(default)]
    pub atomic_writes: bool,

    /// Create missing parent directories of the root. When off, exactly
    /// one directory level is created.
    #[serde(default)]
    pub create_parents: bool,
}

fn default_root() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_default()
        .join(DEFAULT_ROOT_DIR)
}

fn default_indent() -> usize {
    2
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            indent: default_indent(),
            atomic_writes: false,
            create_parents: false,
        }
    }
}

impl StoreConfig {
    /// Configuration rooted at `<cwd>/db`, failing if the working directory
    /// cannot be resolved.
    pub fn from_cwd() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::default().with_root(cwd.join(DEFAULT_ROOT_DIR)))
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_atomic_writes(mut self, atomic: bool) -> Self {
        self.atomic_writes = atomic;
        self
    }

    pub fn with_create_parents(mut self, create: bool) -> Self {
        self.create_parents = create;
        self
    }
}

/// Load a store configuration from a JSON file.
///
/// A relative `root` is resolved against the current working directory.
pub fn load_config(path: &Path) -> Result<StoreConfig> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let mut config: StoreConfig = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    if config.root.is_relative() {
        config.root = std::env::current_dir()?.join(&config.root);
    }

    validate_config(&config)?;

    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

fn validate_config(config: &StoreConfig) -> Result<()> {
    if config.root.as_os_str().is_empty() {
        return Err(Error::Config("root must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.indent, 2);
        assert!(!config.atomic_writes);
        assert!(!config.create_parents);
        assert!(config.root.ends_with(DEFAULT_ROOT_DIR));
    }

    #[test]
    fn test_load_config_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ronybase.json");
        let root = temp_dir.path().join("data");
        std::fs::write(
            &path,
            format!(r#"{{"root": {:?}, "atomic_writes": true}}"#, root.to_str().unwrap()),
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.root, root);
        assert!(config.atomic_writes);
        assert_eq!(config.indent, 2);
    }

    #[test]
    fn test_load_config_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_config(&temp_dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_config_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{ root: ").unwrap();
        assert!(matches!(load_config(&path), Err(Error::Config(_))));
    }
}
