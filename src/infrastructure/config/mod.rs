//! Environment-backed configuration
//!
//! All runtime configuration comes from environment variables (optionally a
//! `.env` file loaded in `main`), read once at startup into an immutable
//! `AppConfig`. When the Tigris backend is enabled, the bucket, endpoint,
//! and both credentials must be present together; startup fails otherwise.

use crate::domain::error::{AppError, Result};
use figment::providers::Env;
use figment::Figment;
use serde::Deserialize;

const ENV_KEYS: &[&str] = &[
    "API_KEY",
    "USE_TIGRIS",
    "DATA_DIR",
    "TIGRIS_BUCKET_NAME",
    "TIGRIS_ENDPOINT",
    "TIGRIS_ACCESS_KEY",
    "TIGRIS_SECRET_KEY",
    "HOST",
    "PORT",
];

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub use_tigris: bool,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub tigris_bucket_name: Option<String>,
    #[serde(default)]
    pub tigris_endpoint: Option<String>,
    #[serde(default)]
    pub tigris_access_key: Option<String>,
    #[serde(default)]
    pub tigris_secret_key: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_data_dir() -> String {
    "01_COMPUTE_data".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Connection settings for the Tigris object storage backend. Only
/// constructible from a config that passed validation.
#[derive(Debug, Clone)]
pub struct TigrisSettings {
    pub bucket: String,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut config: AppConfig = Figment::new()
            .merge(
                Env::raw()
                    .only(ENV_KEYS)
                    .map(|key| key.as_str().to_ascii_lowercase().into()),
            )
            .extract()
            .map_err(|err| AppError::ConfigError(err.to_string()))?;

        // An empty API_KEY means no authentication, same as unset.
        if matches!(config.api_key.as_deref(), Some(key) if key.trim().is_empty()) {
            config.api_key = None;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.use_tigris {
            return Ok(());
        }
        let settings = self.tigris_settings()?;
        url::Url::parse(&settings.endpoint).map_err(|err| {
            AppError::ConfigError(format!(
                "TIGRIS_ENDPOINT is not a valid URL ({}): {}",
                settings.endpoint, err
            ))
        })?;
        Ok(())
    }

    /// The validated Tigris connection settings. Errors when the flag is set
    /// without the full credential set.
    pub fn tigris_settings(&self) -> Result<TigrisSettings> {
        let require = |value: &Option<String>, name: &str| -> Result<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    AppError::ConfigError(format!("{} is required when USE_TIGRIS=true", name))
                })
        };
        Ok(TigrisSettings {
            bucket: require(&self.tigris_bucket_name, "TIGRIS_BUCKET_NAME")?,
            endpoint: require(&self.tigris_endpoint, "TIGRIS_ENDPOINT")?,
            access_key: require(&self.tigris_access_key, "TIGRIS_ACCESS_KEY")?,
            secret_key: require(&self.tigris_secret_key, "TIGRIS_SECRET_KEY")?,
        })
    }

    pub fn storage_mode(&self) -> &'static str {
        if self.use_tigris {
            "tigris"
        } else {
            "local"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        figment::Jail::expect_with(|_jail| {
            let config = AppConfig::load().unwrap();
            assert_eq!(config.api_key, None);
            assert!(!config.use_tigris);
            assert_eq!(config.data_dir, "01_COMPUTE_data");
            assert_eq!(config.host, "0.0.0.0");
            assert_eq!(config.port, 8000);
            Ok(())
        });
    }

    #[test]
    fn test_reads_env_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("API_KEY", "secret-key");
            jail.set_env("DATA_DIR", "data");
            jail.set_env("PORT", "9000");
            let config = AppConfig::load().unwrap();
            assert_eq!(config.api_key.as_deref(), Some("secret-key"));
            assert_eq!(config.data_dir, "data");
            assert_eq!(config.port, 9000);
            Ok(())
        });
    }

    #[test]
    fn test_empty_api_key_is_none() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("API_KEY", "");
            let config = AppConfig::load().unwrap();
            assert_eq!(config.api_key, None);
            Ok(())
        });
    }

    #[test]
    fn test_tigris_requires_full_credential_set() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("USE_TIGRIS", "true");
            jail.set_env("TIGRIS_BUCKET_NAME", "acompute");
            jail.set_env("TIGRIS_ENDPOINT", "https://fly.storage.tigris.dev");
            jail.set_env("TIGRIS_ACCESS_KEY", "access");
            // TIGRIS_SECRET_KEY missing
            let err = AppConfig::load().unwrap_err();
            assert!(matches!(err, AppError::ConfigError(_)));
            assert!(err.to_string().contains("TIGRIS_SECRET_KEY"));
            Ok(())
        });
    }

    #[test]
    fn test_tigris_rejects_invalid_endpoint() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("USE_TIGRIS", "true");
            jail.set_env("TIGRIS_BUCKET_NAME", "acompute");
            jail.set_env("TIGRIS_ENDPOINT", "not a url");
            jail.set_env("TIGRIS_ACCESS_KEY", "access");
            jail.set_env("TIGRIS_SECRET_KEY", "secret");
            let err = AppConfig::load().unwrap_err();
            assert!(err.to_string().contains("TIGRIS_ENDPOINT"));
            Ok(())
        });
    }

    #[test]
    fn test_tigris_full_set_accepted() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("USE_TIGRIS", "true");
            jail.set_env("TIGRIS_BUCKET_NAME", "acompute");
            jail.set_env("TIGRIS_ENDPOINT", "https://fly.storage.tigris.dev");
            jail.set_env("TIGRIS_ACCESS_KEY", "access");
            jail.set_env("TIGRIS_SECRET_KEY", "secret");
            let config = AppConfig::load().unwrap();
            let settings = config.tigris_settings().unwrap();
            assert_eq!(settings.bucket, "acompute");
            assert_eq!(config.storage_mode(), "tigris");
            Ok(())
        });
    }
}
