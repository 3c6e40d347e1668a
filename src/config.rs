//! Configuration management for gecko-search
//!
//! Handles loading, saving, and validating the search configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::session::{Library, SessionConfig};

/// Fatal configuration problems, reported before any session exists
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("backend.app_id is not set")]
    MissingAppId,

    #[error("backend.api_key is not set")]
    MissingApiKey,

    #[error("backend.index_name is not set")]
    MissingIndexName,

    #[error("backend.records must point to a records file for the memory backend")]
    MissingRecords,

    #[error("library.key is not set")]
    MissingLibraryKey,

    #[error("session.hits_per_page must be greater than zero")]
    ZeroHitsPerPage,

    #[error("session.marker must not be empty")]
    EmptyMarker,

    #[error("invalid backend host '{0}'")]
    InvalidHost(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub links: LinksConfig,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub service: ServiceConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    pub config_path: PathBuf,
}

/// Search backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend: "algolia" (hosted index) or "memory" (records file)
    #[serde(default)]
    pub kind: SearchBackendType,

    #[serde(default)]
    pub app_id: String,

    /// Search-only API key
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Overrides `https://{app_id}-dsn.algolia.net`
    #[serde(default)]
    pub host: Option<String>,

    /// Records file served by the memory backend
    #[serde(default)]
    pub records: Option<PathBuf>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Search backend type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackendType {
    /// Hosted Algolia index
    #[default]
    Algolia,
    /// JSON records served from memory
    Memory,
}

/// The library the search dialog is embedded in
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

/// Session tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_hits_per_page")]
    pub hits_per_page: u32,

    /// URL fragment that marks the dialog as open
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Delay after which a pending fetch reports as stalled
    #[serde(default = "default_stalled_delay_ms")]
    pub stalled_delay_ms: u64,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_index_name() -> String {
    "boost".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_url_prefix() -> String {
    "https://www.boost.org/doc/".to_string()
}

fn default_hits_per_page() -> u32 {
    30
}

fn default_marker() -> String {
    "search-dialog".to_string()
}

fn default_stalled_delay_ms() -> u64 {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: SearchBackendType::default(),
            app_id: String::new(),
            api_key: String::new(),
            index_name: default_index_name(),
            host: None,
            records: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            url_prefix: default_url_prefix(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            hits_per_page: default_hits_per_page(),
            marker: default_marker(),
            stalled_delay_ms: default_stalled_delay_ms(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("org", "cppalliance", "gecko-search") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from("gecko-search.toml")
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from a file, or create a default one if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config = if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let mut config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            config.config_path = config_path.to_path_buf();
            config
        } else {
            info!("Config file not found, creating default at {:?}", config_path);
            let config = Config {
                config_path: config_path.to_path_buf(),
                ..Config::default()
            };
            config.save()?;
            config
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
        }

        fs::write(&self.config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", self.config_path))?;

        info!("Configuration saved to {:?}", self.config_path);
        Ok(())
    }

    /// Check that the backend section can reach an index
    pub fn validate_backend(&self) -> Result<(), ConfigError> {
        let backend = &self.backend;
        if backend.index_name.trim().is_empty() {
            return Err(ConfigError::MissingIndexName);
        }
        match backend.kind {
            SearchBackendType::Algolia => {
                if backend.app_id.trim().is_empty() {
                    return Err(ConfigError::MissingAppId);
                }
                if backend.api_key.trim().is_empty() {
                    return Err(ConfigError::MissingApiKey);
                }
                if let Some(host) = &backend.host {
                    if !(host.starts_with("http://") || host.starts_with("https://")) {
                        return Err(ConfigError::InvalidHost(host.clone()));
                    }
                }
            }
            SearchBackendType::Memory => {
                if backend.records.is_none() {
                    return Err(ConfigError::MissingRecords);
                }
            }
        }
        Ok(())
    }

    /// Build the session settings; validation happens when the session is created
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            index_name: self.backend.index_name.clone(),
            library: Library {
                key: self.library.key.clone(),
                name: if self.library.name.is_empty() {
                    self.library.key.clone()
                } else {
                    self.library.name.clone()
                },
            },
            url_prefix: self.links.url_prefix.clone(),
            hits_per_page: self.session.hits_per_page,
            marker: self.session.marker.clone(),
            stalled_delay: Duration::from_millis(self.session.stalled_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn algolia_config() -> Config {
        let mut config = Config::default();
        config.backend.app_id = "APPID".to_string();
        config.backend.api_key = "search-key".to_string();
        config.library.key = "core".to_string();
        config
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.session.hits_per_page, 30);
        assert_eq!(config.session.marker, "search-dialog");
        assert_eq!(config.backend.kind, SearchBackendType::Algolia);
        assert_eq!(config.library.key, "");
        assert_eq!(config.library.name, "");
        assert_eq!(config.config_path, path);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[backend]
kind = "memory"
records = "records.json"

[library]
key = "core"
name = "Core"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend.kind, SearchBackendType::Memory);
        assert_eq!(config.backend.records, Some(PathBuf::from("records.json")));
        assert_eq!(config.backend.index_name, "boost");
        assert_eq!(config.links.url_prefix, "https://www.boost.org/doc/");
        assert_eq!(config.session.stalled_delay_ms, 200);
        assert!(config.validate_backend().is_ok());
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[backend\nkind = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err}").contains("Failed to parse config file"));
    }

    #[test]
    fn algolia_backend_requires_credentials() {
        let mut config = algolia_config();
        assert_eq!(config.validate_backend(), Ok(()));

        config.backend.api_key.clear();
        assert_eq!(config.validate_backend(), Err(ConfigError::MissingApiKey));

        config.backend.app_id = "  ".to_string();
        assert_eq!(config.validate_backend(), Err(ConfigError::MissingAppId));

        let mut config = algolia_config();
        config.backend.host = Some("localhost:9200".to_string());
        assert_eq!(
            config.validate_backend(),
            Err(ConfigError::InvalidHost("localhost:9200".to_string()))
        );
    }

    #[test]
    fn memory_backend_requires_records() {
        let mut config = algolia_config();
        config.backend.kind = SearchBackendType::Memory;
        assert_eq!(config.validate_backend(), Err(ConfigError::MissingRecords));
    }

    #[test]
    fn session_config_uses_key_when_name_is_missing() {
        let config = algolia_config();
        let session = config.session_config();
        assert_eq!(session.library.key, "core");
        assert_eq!(session.library.name, "core");
        assert_eq!(session.stalled_delay, Duration::from_millis(200));
        assert_eq!(session.hits_per_page, 30);
    }
}
