use credex_core::SecureStore;
use credex_cred::{IssuanceMode, DEFAULT_MAX_ATTRIBUTES};
use credex_vault::InMemoryStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{RootError, RootResult};

/// Secure Store backend.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    /// Requires the `sqlite` feature.
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database file for the sqlite backend.
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,
}

fn default_sqlite_path() -> PathBuf {
    dirs_or_default(".credex/wallet.sqlite")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_sqlite_path(),
        }
    }
}

/// Defaults for new revocation registries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_max_credential_count")]
    pub max_credential_count: u32,

    #[serde(default = "default_issuance_mode")]
    pub issuance_mode: IssuanceMode,
}

fn default_max_credential_count() -> u32 {
    100
}

fn default_issuance_mode() -> IssuanceMode {
    IssuanceMode::OnDemand
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_credential_count: default_max_credential_count(),
            issuance_mode: default_issuance_mode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_max_attributes")]
    pub max_attributes: usize,
}

fn default_max_attributes() -> usize {
    DEFAULT_MAX_ATTRIBUTES
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_attributes: default_max_attributes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "credex=info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

/// Top-level configuration for the credex binary.
///
/// Loaded from a TOML file (typically `~/.credex/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredexConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_data_dir() -> PathBuf {
    dirs_or_default(".credex")
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for CredexConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store: StoreConfig::default(),
            registry: RegistryConfig::default(),
            schema: SchemaConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl CredexConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: CredexConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> RootResult<()> {
        if self.registry.max_credential_count == 0 {
            return Err(RootError::Config(
                "registry.max_credential_count must be > 0".into(),
            ));
        }
        if self.schema.max_attributes == 0 {
            return Err(RootError::Config("schema.max_attributes must be > 0".into()));
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.path.as_os_str().is_empty() {
            return Err(RootError::Config(
                "store.path is required for the sqlite backend".into(),
            ));
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".credex/config.toml")
    }

    /// Open the configured Secure Store. Parties share it through their
    /// own wallet namespaces.
    pub fn open_store(&self) -> RootResult<Arc<dyn SecureStore>> {
        match self.store.backend {
            StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
            StoreBackend::Sqlite => open_sqlite(&self.store.path),
        }
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(path: &Path) -> RootResult<Arc<dyn SecureStore>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let path = path
        .to_str()
        .ok_or_else(|| RootError::Config(format!("store.path is not UTF-8: {}", path.display())))?;
    Ok(Arc::new(credex_vault::SqliteStore::open(path)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_path: &Path) -> RootResult<Arc<dyn SecureStore>> {
    Err(RootError::Config(
        "sqlite backend requested but credex was built without the sqlite feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CredexConfig::default();
        assert!(config.data_dir.to_str().unwrap().contains(".credex"));
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.registry.max_credential_count, 100);
        assert_eq!(config.registry.issuance_mode, IssuanceMode::OnDemand);
        assert_eq!(config.schema.max_attributes, 125);
        assert_eq!(config.log.filter, "credex=info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
data_dir = "/tmp/test-credex"

[store]
backend = "sqlite"
path = "/tmp/test-credex/wallet.sqlite"

[registry]
max_credential_count = 5
issuance_mode = "ISSUANCE_BY_DEFAULT"

[schema]
max_attributes = 10
"#;
        let config: CredexConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/test-credex"));
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.registry.max_credential_count, 5);
        assert_eq!(config.registry.issuance_mode, IssuanceMode::ByDefault);
        assert_eq!(config.schema.max_attributes, 10);
        assert_eq!(config.log.filter, "credex=info");
    }

    #[test]
    fn test_config_validate_zero_registry() {
        let mut config = CredexConfig::default();
        config.registry.max_credential_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_attributes() {
        let mut config = CredexConfig::default();
        config.schema.max_attributes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_empty_sqlite_path() {
        let mut config = CredexConfig::default();
        config.store.backend = StoreBackend::Sqlite;
        config.store.path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = CredexConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.registry.max_credential_count, 100);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = std::env::temp_dir().join("credex-test-config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let mut config = CredexConfig::default();
        config.registry.max_credential_count = 7;
        config.log.filter = "credex=debug".into();
        config.save(&path).unwrap();

        let loaded = CredexConfig::load(&path).unwrap();
        assert_eq!(loaded.registry.max_credential_count, 7);
        assert_eq!(loaded.log.filter, "credex=debug");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = std::env::temp_dir().join("credex-test-invalid-config");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[schema]\nmax_attributes = 0\n").unwrap();
        assert!(matches!(
            CredexConfig::load(&path).unwrap_err(),
            RootError::Config(_)
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_memory_store_opens() {
        assert!(CredexConfig::default().open_store().is_ok());
    }
}
