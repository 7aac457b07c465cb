//! Error types for docstash
//!
//! Store and cache operations degrade to "no data" instead of failing, so
//! most of these surface only from construction, address parsing and the CLI.

use crate::path::PathError;
use crate::watch::WatchError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for docstash operations
pub type StashResult<T> = Result<T, StashError>;

/// All errors that can occur in docstash
#[derive(Error, Debug)]
pub enum StashError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown config key: {0}")]
    ConfigKey(String),

    // Document errors
    #[error(transparent)]
    Address(#[from] PathError),

    #[error("Document root must be an object, found {0}")]
    DocumentRoot(&'static str),

    #[error("Invalid descriptor: {0}")]
    DescriptorInvalid(String),

    #[error("No value at {address} in {path}")]
    NodeMissing { address: String, path: PathBuf },

    #[error("Failed to save {0}")]
    SaveFailed(PathBuf),

    // Watch errors
    #[error(transparent)]
    Watch(#[from] WatchError),

    // Cache errors
    #[error("Failed to open cache at {path}: {source}")]
    CacheOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("No cached content for {0}")]
    CacheMiss(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StashError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Address(_) => Some("Addresses look like: a.b.c, list[0], list[-1]"),
            Self::ConfigKey(_) => Some("Run: docstash config show"),
            Self::CacheMiss(_) => Some("Check the URL or your network connection and retry"),
            Self::Watch(_) => Some("Set documents.watch.mode = \"polling\" in the config"),
            Self::NodeMissing { .. } => Some("Run: docstash show <file> to see the whole document"),
            Self::SaveFailed(_) => Some("Run with -v for details"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StashError::fetch("http://x", "connection refused");
        assert!(err.to_string().contains("Fetch failed for http://x"));
    }

    #[test]
    fn error_hint() {
        let err = StashError::ConfigKey("nope".to_string());
        assert_eq!(err.hint(), Some("Run: docstash config show"));
    }

    #[test]
    fn address_error_converts() {
        let err: StashError = PathError::EmptySegment("a..b".to_string()).into();
        assert!(err.to_string().contains("a..b"));
        assert!(err.hint().is_some());
    }
}
