//! Config module - Manages tabvault configuration (tabvault.toml).
//!
//! Configuration file contains:
//! - Storage settings (store path, namespace, compression, quota, disposable keys)
//! - Autosave settings
//! - Backend API settings

use crate::storage::codec::COMPRESSION_THRESHOLD;
use crate::storage::keys::DEFAULT_NAMESPACE;
use crate::storage::quota::{default_disposable_keys, DisposableKey};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite store file
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Prefix of every physical key owned by the application
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Older prefixes still removed by clear-all
    #[serde(default)]
    pub legacy_prefixes: Vec<String>,

    /// Serialized size (bytes) above which values are compressed
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,

    /// Store quota in bytes (0 = unbounded)
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: usize,

    /// Keys evicted under quota pressure
    #[serde(default = "default_disposable_keys")]
    pub disposable: Vec<DisposableKey>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_compression_threshold() -> usize {
    COMPRESSION_THRESHOLD
}

fn default_quota_bytes() -> usize {
    // Same budget browsers give localStorage
    5 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            namespace: default_namespace(),
            legacy_prefixes: Vec::new(),
            compression_threshold: default_compression_threshold(),
            quota_bytes: default_quota_bytes(),
            disposable: default_disposable_keys(),
        }
    }
}

impl StorageConfig {
    /// Quota to enforce, if any.
    pub fn quota(&self) -> Option<usize> {
        (self.quota_bytes > 0).then_some(self.quota_bytes)
    }

    /// Reject settings that would let the store touch keys it does not own.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            bail!("storage.namespace must not be empty");
        }
        Ok(())
    }
}

/// Autosave configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveConfig {
    /// Seconds between dirty checks
    #[serde(default = "default_autosave_interval")]
    pub interval_secs: u64,
}

fn default_autosave_interval() -> u64 {
    crate::autosave::DEFAULT_INTERVAL.as_secs()
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_autosave_interval(),
        }
    }
}

impl AutosaveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Backend API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL the `/api/*` paths are joined to
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_api_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_api_timeout(),
        }
    }
}

/// Main tabvault configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Config version (for future migrations)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Where exports are written (default: downloads dir)
    #[serde(default)]
    pub export_path: Option<PathBuf>,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub autosave: AutosaveConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            export_path: None,
            storage: StorageConfig::default(),
            autosave: AutosaveConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// Get default store path.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("tabvault").join("store.db"))
        .unwrap_or_else(|| PathBuf::from("./store.db"))
}

/// Get default config directory (~/.config/tabvault/).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("tabvault"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get default config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("tabvault.toml")
}

impl Config {
    /// Create new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Cannot parse config file: {}", path.display()))?;
        config
            .storage
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from `path`, or the default path when `None`.
    /// A missing file yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).with_context(|| "Cannot serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Cannot write config file: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Directory exports are downloaded to.
    pub fn export_dir(&self) -> PathBuf {
        self.export_path
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.storage.compression_threshold, 1024);
        assert_eq!(config.storage.namespace, "tabvault_");
        assert_eq!(config.autosave.interval(), Duration::from_secs(30));
        assert_eq!(config.storage.disposable.len(), 4);
        assert_eq!(config.storage.quota(), Some(5 * 1024 * 1024));
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test.toml");

        let mut config = Config::new();
        config.storage.namespace = "shop_".to_string();
        config.storage.disposable = vec![DisposableKey::new("thumbnails", 0)];
        config.autosave.interval_secs = 10;
        config.save(&config_path)?;

        let loaded = Config::load(&config_path)?;
        assert_eq!(loaded.storage.namespace, "shop_");
        assert_eq!(loaded.storage.disposable, vec![DisposableKey::new("thumbnails", 0)]);
        assert_eq!(loaded.autosave.interval_secs, 10);

        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let config: Config = toml::from_str(
            r#"
            [storage]
            namespace = "app_"

            [[storage.disposable]]
            key = "drafts_cache"
            "#,
        )?;
        assert_eq!(config.storage.namespace, "app_");
        assert_eq!(config.storage.compression_threshold, 1024);
        assert_eq!(config.storage.disposable, vec![DisposableKey::new("drafts_cache", 0)]);
        assert_eq!(config.api.timeout_secs, 30);
        Ok(())
    }

    #[test]
    fn test_empty_namespace_is_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("empty_ns.toml");
        std::fs::write(&config_path, "[storage]\nnamespace = \"\"\n")?;

        let err = Config::load(&config_path).unwrap_err();
        assert!(format!("{:#}", err).contains("namespace"));
        Ok(())
    }

    #[test]
    fn test_load_or_default_missing_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = Config::load_or_default(Some(&temp_dir.path().join("absent.toml")))?;
        assert_eq!(config.storage.namespace, "tabvault_");
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_save_permissions() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test_perms.toml");

        Config::new().save(&config_path)?;

        let mode = std::fs::metadata(&config_path)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600, "Config file should have 0600 permissions");

        Ok(())
    }
}
