//! Configuration management for docstash

pub mod schema;

pub use schema::{CacheConfig, Config, DocumentsConfig, GeneralConfig, WatchConfig};

use crate::cache::replace_file;
use crate::either::Either;
use crate::error::{StashError, StashResult};
use crate::path;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Locates, reads and writes `config.toml`.
///
/// The file lives under the platform config directory unless `--config` or
/// `DOCSTASH_CONFIG` names another one. A missing file is not an error; the
/// built-in defaults apply until `docstash config init` or `config set`
/// writes one.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// `<config dir>/docstash/config.toml`, or `./docstash/config.toml`
    /// where the platform has no config directory
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docstash")
            .join("config.toml")
    }

    /// Where the content cache keeps its manifest and blobs when
    /// `cache.dir` is unset
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docstash")
    }

    pub fn cache_dir(config: &Config) -> PathBuf {
        config
            .cache
            .dir
            .clone()
            .unwrap_or_else(Self::default_cache_dir)
    }

    /// Read the config file. Absent sections and keys take their defaults.
    pub async fn load(&self) -> StashResult<Config> {
        let path = &self.config_path;
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(StashError::io(
                    format!("reading config from {}", path.display()),
                    e,
                ))
            }
        };

        toml::from_str(&content).map_err(|e| StashError::ConfigInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })
    }

    /// Write `config` in full, replacing the file in one rename
    pub async fn save(&self, config: &Config) -> StashResult<()> {
        let path = &self.config_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StashError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let content = toml::to_string_pretty(config)?;
        replace_file(path, content.as_bytes())
            .await
            .map_err(|e| StashError::io(format!("writing config to {}", path.display()), e))?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse command-line text as JSON, falling back to a plain string
pub fn parse_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Return a copy of `config` with the dotted `key` set to `value`.
///
/// `value` is parsed as JSON when possible (`true`, `250`, `"text"`) and
/// taken as a plain string otherwise. Unknown keys are rejected.
pub fn apply_setting(config: &Config, key: &str, value: &str) -> StashResult<Config> {
    let mut tree = serde_json::to_value(config)?;
    if path::resolve(&tree, key).is_none() {
        return Err(StashError::ConfigKey(key.to_string()));
    }

    path::ensure_and_set(&mut tree, key, Some(Either::Left(parse_value(value))))?;

    serde_json::from_value(tree).map_err(|e| StashError::ConfigInvalid {
        path: PathBuf::from(key),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.general.log_format, "text");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("docstash").join("config.toml");
        let manager = ConfigManager::with_path(path.clone());

        let mut config = Config::default();
        config.cache.ttl_secs = 60;

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.cache.ttl_secs, 60);
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("config.toml")]);
    }

    #[tokio::test]
    async fn invalid_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache\nttl_secs = ").unwrap();
        let manager = ConfigManager::with_path(path);

        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, StashError::ConfigInvalid { .. }));
    }

    #[test]
    fn apply_setting_parses_values() {
        let config = Config::default();
        let config = apply_setting(&config, "documents.eager", "true").unwrap();
        let config = apply_setting(&config, "documents.watch.mode", "polling").unwrap();
        let config = apply_setting(&config, "cache.dir", "/tmp/stash").unwrap();

        assert!(config.documents.eager);
        assert_eq!(config.documents.watch.mode, crate::watch::WatchMode::Polling);
        assert_eq!(config.cache.dir, Some(PathBuf::from("/tmp/stash")));
    }

    #[test]
    fn apply_setting_rejects_unknown_and_mistyped() {
        let config = Config::default();
        assert!(matches!(
            apply_setting(&config, "cache.nope", "1"),
            Err(StashError::ConfigKey(_))
        ));
        assert!(apply_setting(&config, "cache.ttl_secs", "soon").is_err());
    }

    #[test]
    fn parse_value_falls_back_to_string() {
        assert_eq!(parse_value("42"), serde_json::json!(42));
        assert_eq!(parse_value("[1, 2]"), serde_json::json!([1, 2]));
        assert_eq!(parse_value("hello world"), serde_json::json!("hello world"));
    }

    #[test]
    fn cache_dir_prefers_config() {
        let mut config = Config::default();
        config.cache.dir = Some(PathBuf::from("/srv/cache"));
        assert_eq!(ConfigManager::cache_dir(&config), PathBuf::from("/srv/cache"));
    }
}
