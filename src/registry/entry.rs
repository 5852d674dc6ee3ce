//! Registry entries: one reference dataset identified by its metadata file.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A reference dataset, identified by the path of its metadata descriptor
/// relative to the reference-data root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetDescriptor {
    id: String,
}

impl DatasetDescriptor {
    /// Creates a descriptor from a relative metadata path.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The identifier as registered.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolves the metadata path under `root`.
    ///
    /// The identifier must be relative and must not climb out of the root.
    /// The root and the metadata file must both exist.
    pub fn resolve(&self, root: &Path) -> Result<PathBuf, ConfigError> {
        let rel = Path::new(&self.id);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if self.id.is_empty() || escapes {
            return Err(ConfigError::InvalidIdentifier(self.id.clone()));
        }

        if !root.is_dir() {
            return Err(ConfigError::MissingRoot(root.to_path_buf()));
        }

        let path = root.join(rel);
        if !path.is_file() {
            return Err(ConfigError::MissingMetadata {
                dataset: self.id.clone(),
                path,
            });
        }
        Ok(path)
    }

    /// A filesystem-safe name derived from the identifier, stable across runs.
    ///
    /// `grambank/grambank-cldf/cldf/StructureDataset-metadata.json` becomes
    /// `grambank_grambank-cldf_cldf_StructureDataset-metadata`.
    pub fn slug(&self) -> String {
        let trimmed = self
            .id
            .strip_suffix(".json")
            .unwrap_or(&self.id)
            .trim_matches('/');
        trimmed
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '.' => c,
                _ => '_',
            })
            .collect()
    }
}

impl std::fmt::Display for DatasetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

impl From<&str> for DatasetDescriptor {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_slug_is_deterministic_and_safe() {
        let ds = DatasetDescriptor::new("grambank/grambank-cldf/cldf/StructureDataset-metadata.json");
        assert_eq!(ds.slug(), "grambank_grambank-cldf_cldf_StructureDataset-metadata");
        assert_eq!(ds.slug(), ds.slug());

        let odd = DatasetDescriptor::new("a b/c:d.json");
        assert_eq!(odd.slug(), "a_b_c_d");
    }

    #[test]
    fn test_resolve_existing_metadata() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("A")).unwrap();
        fs::write(root.path().join("A/metadata.json"), "{}").unwrap();

        let ds = DatasetDescriptor::new("A/metadata.json");
        let path = ds.resolve(root.path()).unwrap();
        assert_eq!(path, root.path().join("A/metadata.json"));
    }

    #[test]
    fn test_resolve_missing_metadata() {
        let root = TempDir::new().unwrap();
        let ds = DatasetDescriptor::new("B/metadata.json");
        match ds.resolve(root.path()) {
            Err(ConfigError::MissingMetadata { dataset, .. }) => {
                assert_eq!(dataset, "B/metadata.json")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing_root() {
        let root = TempDir::new().unwrap();
        let gone = root.path().join("does-not-exist");
        let ds = DatasetDescriptor::new("A/metadata.json");
        assert_eq!(ds.resolve(&gone), Err(ConfigError::MissingRoot(gone.clone())));
    }

    #[test]
    fn test_resolve_rejects_escaping_identifiers() {
        let root = TempDir::new().unwrap();
        for id in ["../secret.json", "/etc/passwd", ""] {
            let ds = DatasetDescriptor::new(id);
            assert!(
                matches!(ds.resolve(root.path()), Err(ConfigError::InvalidIdentifier(_))),
                "{id} should be rejected"
            );
        }
    }
}
