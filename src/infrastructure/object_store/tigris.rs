use super::DatasetStore;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::TigrisSettings;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use tracing::debug;

/// S3-compatible dataset store backed by Tigris. Errors are propagated, not
/// retried; a missing object maps to `NotFound` and every transport failure
/// to `StorageUnavailable`.
pub struct TigrisStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl TigrisStore {
    pub fn new(settings: &TigrisSettings) -> Self {
        let credentials = Credentials::from_keys(
            settings.access_key.as_str(),
            settings.secret_key.as_str(),
            None,
        );
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(settings.endpoint.clone())
            .credentials_provider(credentials)
            .build();
        Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket: settings.bucket.clone(),
        }
    }
}

#[async_trait]
impl DatasetStore for TigrisStore {
    async fn fetch_json(&self, key: &str) -> Result<serde_json::Value> {
        debug!(bucket = %self.bucket, key, "fetching object");
        match self
            .client
            .get_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|err| {
                        AppError::StorageUnavailable(format!(
                            "failed to read object body for {}: {}",
                            key, err
                        ))
                    })?
                    .into_bytes();
                serde_json::from_slice(&bytes).map_err(|err| {
                    AppError::ParseError(format!("invalid JSON in object {}: {}", key, err))
                })
            }
            Err(SdkError::ServiceError(context)) if context.err().is_no_such_key() => Err(
                AppError::NotFound(format!("object not found: {}", key)),
            ),
            Err(err) => Err(AppError::StorageUnavailable(format!(
                "failed to fetch object {}: {}",
                key, err
            ))),
        }
    }

    async fn list_source_ids(&self, prefix: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(self.bucket.as_str())
            .prefix(format!("{}/", prefix.trim_end_matches('/')))
            .delimiter("/")
            .send()
            .await
            .map_err(|err| {
                AppError::StorageUnavailable(format!("failed to list data sources: {}", err))
            })?;

        let mut sources: Vec<String> = response
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix())
            .filter_map(source_id_from_prefix)
            .map(str::to_string)
            .collect();
        sources.sort();
        Ok(sources)
    }

    fn backend_name(&self) -> &'static str {
        "tigris"
    }
}

/// The last path segment of a common prefix like `01_COMPUTE_data/gss/`.
fn source_id_from_prefix(prefix: &str) -> Option<&str> {
    prefix
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_from_prefix() {
        assert_eq!(source_id_from_prefix("01_COMPUTE_data/gss/"), Some("gss"));
        assert_eq!(source_id_from_prefix("data/yrbs"), Some("yrbs"));
        assert_eq!(source_id_from_prefix("/"), None);
        assert_eq!(source_id_from_prefix(""), None);
    }
}
