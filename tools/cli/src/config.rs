//! CLI configuration file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the store used when nothing else is configured.
const DEFAULT_STORE: &str = "nodesync-store.json";

/// Persistent CLI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Named store files.
    pub aliases: BTreeMap<String, PathBuf>,
    /// Store used when neither `--store` nor `--alias` is given.
    pub default_store: Option<PathBuf>,
    /// Quiet period after which the event stream counts as drained.
    pub settle_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            default_store: None,
            settle_ms: 200,
        }
    }
}

impl CliConfig {
    /// Platform location of the config file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nodesync").join("config.json"))
    }

    /// Load the config at `path`; a missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => serde_json::from_str(&json)
                .with_context(|| format!("Invalid config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read config {}", path.display()))
            }
        }
    }

    /// Write the config to `path`, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    /// Pick the store file for this invocation.
    ///
    /// An explicit store wins over an alias, which wins over the configured
    /// default.
    pub fn resolve_store(&self, store: Option<PathBuf>, alias: Option<&str>) -> Result<PathBuf> {
        if let Some(store) = store {
            return Ok(store);
        }
        if let Some(alias) = alias {
            return match self.aliases.get(alias) {
                Some(path) => Ok(path.clone()),
                None => bail!("Unknown alias: {}", alias),
            };
        }
        Ok(self
            .default_store
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.settle_ms, 200);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = CliConfig::default();
        config.aliases.insert("prod".to_string(), PathBuf::from("/srv/prod.json"));
        config.settle_ms = 50;
        config.save(&path).await.unwrap();

        assert_eq!(CliConfig::load(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"default_store":"main.json"}"#)
            .await
            .unwrap();

        let config = CliConfig::load(&path).await.unwrap();
        assert_eq!(config.default_store, Some(PathBuf::from("main.json")));
        assert_eq!(config.settle_ms, 200);
    }

    #[test]
    fn test_resolve_store_precedence() {
        let mut config = CliConfig::default();
        config.aliases.insert("dev".to_string(), PathBuf::from("dev.json"));

        assert_eq!(
            config.resolve_store(Some(PathBuf::from("x.json")), Some("dev")).unwrap(),
            PathBuf::from("x.json")
        );
        assert_eq!(
            config.resolve_store(None, Some("dev")).unwrap(),
            PathBuf::from("dev.json")
        );
        assert!(config.resolve_store(None, Some("missing")).is_err());
        assert_eq!(
            config.resolve_store(None, None).unwrap(),
            PathBuf::from(DEFAULT_STORE)
        );

        config.default_store = Some(PathBuf::from("main.json"));
        assert_eq!(
            config.resolve_store(None, None).unwrap(),
            PathBuf::from("main.json")
        );
    }
}
