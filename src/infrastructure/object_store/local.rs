use super::DatasetStore;
use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Filesystem-backed dataset store. Performs no network I/O.
pub struct LocalStore {
    base: PathBuf,
}

impl LocalStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl DatasetStore for LocalStore {
    async fn fetch_json(&self, key: &str) -> Result<serde_json::Value> {
        let path = self.base.join(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!(
                    "file not found: {}",
                    path.display()
                )));
            }
            Err(err) => return Err(AppError::IoError(err.to_string())),
        };
        serde_json::from_str(&content).map_err(|err| {
            AppError::ParseError(format!("invalid JSON in {}: {}", path.display(), err))
        })
    }

    async fn list_source_ids(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.base.join(prefix);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(AppError::IoError(err.to_string())),
        };

        let mut sources = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| AppError::IoError(err.to_string()))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                if let Some(name) = entry.file_name().to_str() {
                    sources.push(name.to_string());
                }
            }
        }
        sources.sort();
        Ok(sources)
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    fn seed_store(dir: &tempfile::TempDir) -> LocalStore {
        let gss_dir = dir.path().join("data").join("gss");
        std_fs::create_dir_all(&gss_dir).unwrap();
        std_fs::write(
            gss_dir.join("gss_dictionary_compute.json"),
            r#"{"happy": {"label": "General happiness"}}"#,
        )
        .unwrap();
        let yrbs_dir = dir.path().join("data").join("yrbs");
        std_fs::create_dir_all(&yrbs_dir).unwrap();
        LocalStore::new(dir.path())
    }

    #[tokio::test]
    async fn test_fetch_json_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = seed_store(&dir);

        let value = store
            .fetch_json("data/gss/gss_dictionary_compute.json")
            .await
            .unwrap();
        assert_eq!(value["happy"]["label"], "General happiness");
    }

    #[tokio::test]
    async fn test_fetch_json_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = seed_store(&dir);

        let err = store.fetch_json("data/gss/missing.json").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_json_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = seed_store(&dir);
        std_fs::write(dir.path().join("data/gss/bad.json"), "not json").unwrap();

        let err = store.fetch_json("data/gss/bad.json").await.unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_list_source_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = seed_store(&dir);

        let sources = store.list_source_ids("data").await.unwrap();
        assert_eq!(sources, vec!["gss", "yrbs"]);
    }

    #[tokio::test]
    async fn test_list_source_ids_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let sources = store.list_source_ids("nope").await.unwrap();
        assert!(sources.is_empty());
    }
}
