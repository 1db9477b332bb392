//! Application Configuration
//!
//! Manages all mozbuilds settings including:
//! - Remote endpoints (archive, Treeherder, Taskcluster, GitHub)
//! - Network limits (timeouts, fan-out, concurrent downloads)
//! - Cache location and tracked namespaces
//! - Device overrides

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::{info, debug};

use crate::error::{MozBuildsError, Result};

/// Remote endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointConfig {
    /// Root of the static directory-listing archive
    pub archive_base: String,
    /// Treeherder REST API
    pub treeherder_base: String,
    /// Taskcluster queue API
    pub taskcluster_base: String,
    /// Taskcluster index API
    pub taskcluster_index_base: String,
    /// GitHub REST API
    pub github_api_base: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            archive_base: "https://archive.mozilla.org/pub/".to_string(),
            treeherder_base: "https://treeherder.mozilla.org/api/".to_string(),
            taskcluster_base: "https://firefox-ci-tc.services.mozilla.com/api/queue/v1/".to_string(),
            taskcluster_index_base: "https://firefox-ci-tc.services.mozilla.com/api/index/v1/"
                .to_string(),
            github_api_base: "https://api.github.com/".to_string(),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
    /// Maximum concurrent artifact lookups per push
    pub fanout_limit: usize,
    /// Maximum concurrent file transfers
    pub max_concurrent_downloads: usize,
    /// Number of recent pushes fetched for an author lookup
    pub author_push_count: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            fanout_limit: 8,
            max_concurrent_downloads: 3,
            author_push_count: 10,
        }
    }
}

/// Download cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root; defaults to the platform data directory
    pub root: Option<PathBuf>,
    /// App namespaces scanned and cleared as a unit
    pub namespaces: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            namespaces: vec![
                "fenix".to_string(),
                "focus".to_string(),
                "reference-browser".to_string(),
                "treeherder".to_string(),
                "github".to_string(),
            ],
        }
    }
}

/// Target device configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Fixed ABI list instead of probing the device
    pub abis: Option<Vec<String>>,
    /// Android SDK root used to locate adb
    pub sdk_path: Option<PathBuf>,
    /// Device serial; first online device when unset
    pub serial: Option<String>,
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub endpoints: EndpointConfig,
    pub network: NetworkConfig,
    pub cache: CacheConfig,
    pub device: DeviceConfig,
}

impl AppConfig {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("org", "mozbuilds", "mozbuilds")
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Resolved cache root
    pub fn cache_root(&self) -> PathBuf {
        self.cache
            .root
            .clone()
            .or_else(|| Self::data_dir().map(|dir| dir.join("cache")))
            .unwrap_or_else(|| PathBuf::from(".mozbuilds-cache"))
    }

    /// Load configuration from the default location
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| MozBuildsError::Config("Cannot determine config path".into()))?;
        Self::load_from(&config_file).await
    }

    /// Load configuration from a file, writing defaults if it does not exist
    pub async fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = tokio::fs::read_to_string(path).await?;
            toml::from_str::<AppConfig>(&contents)?
        } else {
            info!("Config file not found, using defaults");
            let config = AppConfig::default();
            config.save_to(path).await?;
            config
        };

        config.validated()
    }

    /// Save configuration to a file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    /// Check limits and normalise base URLs to end with `/`
    pub fn validated(mut self) -> Result<Self> {
        let endpoints = &mut self.endpoints;
        for (name, url) in [
            ("archive_base", &mut endpoints.archive_base),
            ("treeherder_base", &mut endpoints.treeherder_base),
            ("taskcluster_base", &mut endpoints.taskcluster_base),
            ("taskcluster_index_base", &mut endpoints.taskcluster_index_base),
            ("github_api_base", &mut endpoints.github_api_base),
        ] {
            if url.trim().is_empty() {
                return Err(MozBuildsError::Config(format!("endpoints.{} is empty", name)));
            }
            if !url.ends_with('/') {
                url.push('/');
            }
        }

        if self.network.fanout_limit == 0 {
            return Err(MozBuildsError::Config("network.fanout_limit must be at least 1".into()));
        }
        if self.network.max_concurrent_downloads == 0 {
            return Err(MozBuildsError::Config(
                "network.max_concurrent_downloads must be at least 1".into(),
            ));
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.network.fanout_limit, 8);
        assert_eq!(config.network.author_push_count, 10);
        assert!(config.cache.namespaces.contains(&"treeherder".to_string()));
        assert!(config.endpoints.archive_base.ends_with('/'));
    }

    #[test]
    fn test_validation_normalises_urls() {
        let mut config = AppConfig::default();
        config.endpoints.treeherder_base = "http://localhost:8000/api".into();

        let config = config.validated().unwrap();
        assert_eq!(config.endpoints.treeherder_base, "http://localhost:8000/api/");
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let mut config = AppConfig::default();
        config.network.fanout_limit = 0;
        assert!(matches!(config.validated(), Err(MozBuildsError::Config(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("[network]\nfanout_limit = 2\n").unwrap();
        assert_eq!(config.network.fanout_limit, 2);
        assert_eq!(config.network.max_concurrent_downloads, 3);
        assert_eq!(config.endpoints, EndpointConfig::default());
    }

    #[tokio::test]
    async fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = AppConfig::load_from(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config, AppConfig::default());

        let reloaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }
}
