pub mod local;
pub mod tigris;

use crate::domain::error::Result;
use crate::infrastructure::config::AppConfig;
use async_trait::async_trait;
use local::LocalStore;
use std::sync::Arc;
use tigris::TigrisStore;

/// Read-only access to dataset files, keyed by the original data layout
/// (`<data_dir>/<source>/<file>.json`). Local keys are paths relative to the
/// process working directory; Tigris keys are object keys in the bucket.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn fetch_json(&self, key: &str) -> Result<serde_json::Value>;

    /// Enumerate source ids directly under `prefix`.
    async fn list_source_ids(&self, prefix: &str) -> Result<Vec<String>>;

    fn backend_name(&self) -> &'static str;
}

/// Select the storage backend from configuration. The local store is the
/// default; Tigris requires the validated credential set.
pub fn build_store(config: &AppConfig) -> Result<Arc<dyn DatasetStore>> {
    if config.use_tigris {
        let settings = config.tigris_settings()?;
        Ok(Arc::new(TigrisStore::new(&settings)))
    } else {
        Ok(Arc::new(LocalStore::new(".")))
    }
}
