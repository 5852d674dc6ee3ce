//! Dataset registry: the fixed, ordered list of reference datasets.
//!
//! The registry is an immutable value handed to the harness, so tests can
//! substitute small fake registries. It can be:
//! - the built-in list of CLDF reference datasets
//! - constructed directly from descriptors
//! - loaded from a YAML override file

pub mod entry;

pub use entry::DatasetDescriptor;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LoadError};

/// Built-in reference datasets, relative to the reference-data root.
pub const DEFAULT_DATASETS: &[&str] = &[
    "grambank/grambank-cldf/cldf/StructureDataset-metadata.json",
    "glottolog/glottolog-cldf/cldf/cldf-metadata.json",
    "cldf-datasets/lgr/cldf/Generic-metadata.json",
    "cldf-datasets/languageatlasofthepacificarea/cldf/Generic-metadata.json",
    "cldf-datasets/doreco/cldf/Generic-metadata.json",
];

/// On-disk form of a registry override.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    datasets: Vec<String>,
}

/// Ordered, read-only collection of datasets for one harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRegistry {
    datasets: Vec<DatasetDescriptor>,
}

impl DatasetRegistry {
    /// Creates a registry from descriptors, keeping their order.
    pub fn new(datasets: Vec<DatasetDescriptor>) -> Self {
        Self { datasets }
    }

    /// The built-in CLDF reference registry.
    pub fn default_cldf() -> Self {
        Self::new(DEFAULT_DATASETS.iter().map(|&id| id.into()).collect())
    }

    /// Loads a registry from a YAML file of the form:
    ///
    /// ```yaml
    /// datasets:
    ///   - grambank/grambank-cldf/cldf/StructureDataset-metadata.json
    /// ```
    pub fn from_yaml_file(path: &Path) -> Result<Self, LoadError> {
        let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parses a registry from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, LoadError> {
        let file: RegistryFile = serde_yaml::from_str(content)?;
        if file.datasets.is_empty() {
            return Err(LoadError::EmptyRegistry);
        }
        Ok(Self::new(
            file.datasets.into_iter().map(DatasetDescriptor::new).collect(),
        ))
    }

    pub fn datasets(&self) -> &[DatasetDescriptor] {
        &self.datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DatasetDescriptor> {
        self.datasets.iter()
    }

    /// Resolves every entry against `root`, in registry order.
    ///
    /// Failures are returned per entry rather than dropped, so callers can
    /// report each missing dataset.
    pub fn resolve(&self, root: &Path) -> Vec<(DatasetDescriptor, Result<PathBuf, ConfigError>)> {
        self.datasets
            .iter()
            .map(|ds| (ds.clone(), ds.resolve(root)))
            .collect()
    }
}

impl Default for DatasetRegistry {
    fn default() -> Self {
        Self::default_cldf()
    }
}

impl<'a> IntoIterator for &'a DatasetRegistry {
    type Item = &'a DatasetDescriptor;
    type IntoIter = std::slice::Iter<'a, DatasetDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.datasets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_registry_order() {
        let registry = DatasetRegistry::default();
        assert_eq!(registry.len(), 5);
        assert_eq!(
            registry.datasets()[0].id(),
            "grambank/grambank-cldf/cldf/StructureDataset-metadata.json"
        );
        assert_eq!(
            registry.datasets()[4].id(),
            "cldf-datasets/doreco/cldf/Generic-metadata.json"
        );
    }

    #[test]
    fn test_from_yaml_str() {
        let registry =
            DatasetRegistry::from_yaml_str("datasets:\n  - A/metadata.json\n  - B/metadata.json\n")
                .unwrap();
        let ids: Vec<_> = registry.iter().map(|d| d.id().to_string()).collect();
        assert_eq!(ids, vec!["A/metadata.json", "B/metadata.json"]);
    }

    #[test]
    fn test_from_yaml_str_rejects_empty() {
        let err = DatasetRegistry::from_yaml_str("datasets: []\n").unwrap_err();
        assert!(matches!(err, LoadError::EmptyRegistry));
    }

    #[test]
    fn test_resolve_reports_every_entry_in_order() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("A")).unwrap();
        std::fs::write(root.path().join("A/metadata.json"), "{}").unwrap();

        let registry = DatasetRegistry::new(vec!["A/metadata.json".into(), "B/metadata.json".into()]);
        let resolved = registry.resolve(root.path());

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].0.id(), "A/metadata.json");
        assert!(resolved[0].1.is_ok());
        assert_eq!(resolved[1].0.id(), "B/metadata.json");
        assert!(matches!(resolved[1].1, Err(ConfigError::MissingMetadata { .. })));
    }

    #[test]
    fn test_resolve_missing_root_fails_all() {
        let registry = DatasetRegistry::default();
        let resolved = registry.resolve(Path::new("/definitely/not/a/cldf/root"));
        assert!(resolved
            .iter()
            .all(|(_, r)| matches!(r, Err(ConfigError::MissingRoot(_)))));
    }
}
