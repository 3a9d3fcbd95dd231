//! Configuration handling for slink
//!
//! Supports slink.toml and environment variable overrides.

use std::env;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::core::{SlinkError, SlinkResult};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry configuration
    pub registry: RegistryConfig,

    /// Store configuration
    pub store: StoreConfig,

    /// Network configuration
    pub network: NetworkConfig,

    /// Bootstrap installer configuration
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry URL
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store directory; defaults to `~/.slink-store`
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Connection timeout in seconds
    pub timeout: u64,

    /// Maximum concurrent registry operations
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// External installer invoked to hydrate the store with packages
    /// slink has never seen
    pub command: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "https://registry.npmjs.org".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            concurrency: 16,
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            command: "npm".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the project directory and merge with defaults
    pub fn load(project_dir: &Path) -> SlinkResult<Self> {
        let mut config = Config::default();

        let toml_path = project_dir.join("slink.toml");
        if toml_path.exists() {
            let content = std::fs::read_to_string(&toml_path)?;
            config = toml::from_str(&content)?;
        }

        Ok(config.apply_env_overrides())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(registry) = env::var("SLINK_REGISTRY") {
            self.registry.url = registry;
        }

        if let Ok(store_dir) = env::var("SLINK_STORE_DIR") {
            self.store.dir = Some(PathBuf::from(store_dir));
        }

        if let Ok(concurrency) = env::var("SLINK_CONCURRENCY") {
            if let Ok(n) = concurrency.parse() {
                self.network.concurrency = n;
            }
        }

        if let Ok(command) = env::var("SLINK_BOOTSTRAP") {
            self.bootstrap.command = command;
        }

        self
    }

    /// Resolve the store directory without creating it
    pub fn store_dir(&self) -> SlinkResult<PathBuf> {
        if let Some(ref dir) = self.store.dir {
            return Ok(dir.clone());
        }

        let base_dirs = BaseDirs::new()
            .ok_or_else(|| SlinkError::config("Could not determine home directory"))?;
        Ok(base_dirs.home_dir().join(".slink-store"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.registry.url, "https://registry.npmjs.org");
        assert_eq!(config.bootstrap.command, "npm");
        assert_eq!(config.network.concurrency, 16);
    }

    #[test]
    fn test_config_load_empty_dir() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.registry.url, "https://registry.npmjs.org");
    }

    #[test]
    fn test_config_load_toml() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("slink.toml"),
            "[registry]\nurl = \"https://registry.example.com\"\n\n[bootstrap]\ncommand = \"pnpm\"\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.registry.url, "https://registry.example.com");
        assert_eq!(config.bootstrap.command, "pnpm");
    }

    #[test]
    fn test_explicit_store_dir() {
        let config = Config {
            store: StoreConfig {
                dir: Some(PathBuf::from("/tmp/some-store")),
            },
            ..Default::default()
        };
        assert_eq!(config.store_dir().unwrap(), PathBuf::from("/tmp/some-store"));
    }
}
