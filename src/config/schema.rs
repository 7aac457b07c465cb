//! Configuration schema for docstash
//!
//! Configuration is stored at `~/.config/docstash/config.toml`

use crate::watch::WatchMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Structured document settings
    pub documents: DocumentsConfig,

    /// Content cache settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Structured document settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Load documents when opened rather than on first read or write
    pub eager: bool,

    /// Treat missing files as empty documents
    pub create_if_missing: bool,

    /// External edit tracking
    pub watch: WatchConfig,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            eager: false,
            create_if_missing: true,
            watch: WatchConfig::default(),
        }
    }
}

/// File watch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// "native" (OS notifications) or "polling"
    pub mode: WatchMode,

    /// Polling interval in milliseconds (polling mode only)
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Native,
            poll_interval_ms: 1000,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Content cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory (defaults to the platform cache dir)
    pub dir: Option<PathBuf>,

    /// How long fetched content stays fresh, in seconds
    pub ttl_secs: u64,

    /// Quiet period before the manifest is written, in milliseconds
    pub debounce_ms: u64,

    /// Give up on a renewal after this many seconds and serve stale content
    pub renew_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_secs: 24 * 60 * 60,
            debounce_ms: 1000,
            renew_timeout_secs: 30,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn renew_timeout(&self) -> Duration {
        Duration::from_secs(self.renew_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[documents.watch]"));
        assert!(toml.contains("[cache]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache.ttl_secs, 86400);
        assert!(config.documents.create_if_missing);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [documents.watch]
            mode = "polling"
            poll_interval_ms = 250
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.documents.watch.mode, WatchMode::Polling);
        assert_eq!(
            config.documents.watch.poll_interval(),
            Duration::from_millis(250)
        );
        assert_eq!(config.cache.debounce_ms, 1000); // default preserved
    }
}
