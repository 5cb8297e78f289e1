//! Data source registry
//!
//! Source ids are discovered once at startup by listing the store under the
//! configured data directory and are immutable afterwards. Resolution hands
//! out `DatasetHandle`s that know the object keys of a source's files,
//! following the original data layout:
//! `<data_dir>/<id>/<id>_dictionary_compute.json`.

use crate::domain::error::{AppError, Result};
use crate::infrastructure::object_store::DatasetStore;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_SOURCES: [&str; 3] = ["gss", "yrbs", "mtf"];

/// Resolved reference to one registered data source.
#[derive(Debug, Clone)]
pub struct DatasetHandle {
    source_id: String,
    prefix: String,
}

impl DatasetHandle {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn dictionary_key(&self) -> String {
        self.file_key("dictionary_compute")
    }

    pub fn categories_key(&self) -> String {
        self.file_key("category_vars")
    }

    pub fn data_key(&self) -> String {
        self.file_key("data_compute")
    }

    fn file_key(&self, suffix: &str) -> String {
        format!(
            "{}/{}/{}_{}.json",
            self.prefix, self.source_id, self.source_id, suffix
        )
    }
}

pub struct DataSourceRegistry {
    store: Arc<dyn DatasetStore>,
    prefix: String,
    sources: Vec<String>,
}

impl DataSourceRegistry {
    pub fn new(store: Arc<dyn DatasetStore>, prefix: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            sources,
        }
    }

    /// Discover available sources at startup. Falls back to the default
    /// source ids when discovery finds nothing or the backend is
    /// unreachable at boot.
    pub async fn discover(store: Arc<dyn DatasetStore>, data_dir: &str) -> Self {
        let sources = match store.list_source_ids(data_dir).await {
            Ok(sources) if !sources.is_empty() => sources,
            Ok(_) => {
                warn!(
                    data_dir,
                    backend = store.backend_name(),
                    "no data sources found, registering defaults"
                );
                DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
            }
            Err(err) => {
                warn!(
                    data_dir,
                    backend = store.backend_name(),
                    error = %err,
                    "source discovery failed, registering defaults"
                );
                DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
            }
        };
        info!(backend = store.backend_name(), sources = ?sources, "data sources registered");
        Self::new(store, data_dir, sources)
    }

    pub fn resolve(&self, source_id: &str) -> Result<DatasetHandle> {
        if !self.sources.iter().any(|s| s == source_id) {
            return Err(AppError::NotFound(format!(
                "unknown data source: {}",
                source_id
            )));
        }
        Ok(DatasetHandle {
            source_id: source_id.to_string(),
            prefix: self.prefix.clone(),
        })
    }

    pub fn source_ids(&self) -> &[String] {
        &self.sources
    }

    pub fn store(&self) -> &Arc<dyn DatasetStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::object_store::local::LocalStore;
    use std::fs;

    fn registry_with(sources: &[&str]) -> DataSourceRegistry {
        let store: Arc<dyn DatasetStore> = Arc::new(LocalStore::new("."));
        DataSourceRegistry::new(
            store,
            "01_COMPUTE_data",
            sources.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_resolve_registered_source() {
        let registry = registry_with(&["gss"]);
        let handle = registry.resolve("gss").unwrap();
        assert_eq!(handle.source_id(), "gss");
        assert_eq!(
            handle.dictionary_key(),
            "01_COMPUTE_data/gss/gss_dictionary_compute.json"
        );
        assert_eq!(
            handle.categories_key(),
            "01_COMPUTE_data/gss/gss_category_vars.json"
        );
        assert_eq!(handle.data_key(), "01_COMPUTE_data/gss/gss_data_compute.json");
    }

    #[test]
    fn test_resolve_unknown_source_is_not_found() {
        let registry = registry_with(&["gss"]);
        let err = registry.resolve("census").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_discover_reads_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("data/gss")).unwrap();
        fs::create_dir_all(dir.path().join("data/mtf")).unwrap();
        let store: Arc<dyn DatasetStore> = Arc::new(LocalStore::new(dir.path()));

        let registry = DataSourceRegistry::discover(store, "data").await;
        assert_eq!(registry.source_ids(), &["gss".to_string(), "mtf".to_string()]);
    }

    #[tokio::test]
    async fn test_discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DatasetStore> = Arc::new(LocalStore::new(dir.path()));

        let registry = DataSourceRegistry::discover(store, "data").await;
        assert_eq!(registry.source_ids().len(), 3);
        assert!(registry.resolve("gss").is_ok());
    }
}
