//! Application configuration management.
//!
//! Configuration holds the API endpoint, request timeout, where the session
//! is persisted and the last email used to log in. It is stored at
//! `~/.config/fitpro/config.json`; `FITPRO_API_URL` and
//! `FITPRO_TIMEOUT_SECS` override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "fitpro";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// API endpoint used when none is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Requests give up after this many seconds unless configured otherwise.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const ENV_API_URL: &str = "FITPRO_API_URL";
const ENV_TIMEOUT_SECS: &str = "FITPRO_TIMEOUT_SECS";

/// Where the session token and user record are persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub storage_backend: StorageBackend,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_url = Some(url);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?;
            self.request_timeout_secs = Some(secs);
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// API base URL without a trailing slash
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Directory holding the persisted session and log files
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_url(), DEFAULT_API_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.storage_backend, StorageBackend::File);
    }

    #[test]
    fn test_api_url_trims_trailing_slash() {
        let config = Config {
            api_url: Some("https://api.fitpro.example/".to_string()),
            ..Config::default()
        };
        assert_eq!(config.api_url(), "https://api.fitpro.example");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(|name| match name {
                "FITPRO_API_URL" => Some("http://10.0.2.2:8080".to_string()),
                "FITPRO_TIMEOUT_SECS" => Some("3".to_string()),
                _ => None,
            })
            .expect("overrides apply");
        assert_eq!(config.api_url(), "http://10.0.2.2:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_timeout_override() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|name| {
            (name == "FITPRO_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_config_file() {
        let config: Config =
            serde_json::from_str(r#"{"api_url":"https://fitpro.example","storage_backend":"keyring"}"#)
                .expect("parse");
        assert_eq!(config.storage_backend, StorageBackend::Keyring);
        assert_eq!(config.request_timeout_secs, None);
    }
}
