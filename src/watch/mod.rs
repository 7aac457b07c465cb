//! File-change notification multiplexing
//!
//! Many logical watchers share one underlying watch per directory. Each
//! [`Subscription`] cares about a single exact file and only sees events for
//! that file. Two backends implement [`ChangeSource`]:
//!
//! | Backend | Mechanism |
//! |---------|-----------|
//! | [`NativeMultiplexer`] | one `notify` watch per directory, ref-counted |
//! | [`PollingMultiplexer`] | one background thread comparing mtime/len |

pub mod native;
pub mod polling;

pub use native::NativeMultiplexer;
pub use polling::PollingMultiplexer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for watch operations
pub type WatchResult<T> = Result<T, WatchError>;

/// Callback invoked with the normalized path of the changed file
pub type ChangeCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// Errors raised while setting up a watch
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to create file watcher: {0}")]
    Create(#[source] notify::Error),

    #[error("Failed to watch {path}: {source}")]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Cannot resolve {path}: {source}")]
    Normalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a file path: {0}")]
    NotAFile(PathBuf),

    #[error("Failed to start polling thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Which backend to use for change notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    #[default]
    Native,
    Polling,
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Polling => write!(f, "polling"),
        }
    }
}

/// A service handing out per-file change subscriptions
pub trait ChangeSource: Send + Sync {
    /// Start watching `path`; `on_change` fires whenever that exact file changes
    fn subscribe(&self, path: &Path, on_change: ChangeCallback) -> WatchResult<Subscription>;

    /// Backend name for display
    fn name(&self) -> &'static str;
}

/// Create the change source selected by `mode`
pub fn build_source(mode: WatchMode, poll_interval: Duration) -> WatchResult<Arc<dyn ChangeSource>> {
    match mode {
        WatchMode::Native => Ok(Arc::new(NativeMultiplexer::new())),
        WatchMode::Polling => Ok(Arc::new(PollingMultiplexer::new(poll_interval)?)),
    }
}

/// The receiving end of one subscription, shared with its backend
pub(crate) struct Sink {
    path: PathBuf,
    callback: ChangeCallback,
    suspended: AtomicBool,
}

impl Sink {
    pub(crate) fn new(path: PathBuf, callback: ChangeCallback) -> Self {
        Self {
            path,
            callback,
            suspended: AtomicBool::new(false),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Forward an event if it concerns this sink's file
    pub(crate) fn deliver(&self, changed: &Path) {
        if changed == self.path && !self.suspended.load(Ordering::Acquire) {
            (self.callback)(&self.path);
        }
    }
}

/// Handle for one consumer watching one file. Dropping it unsubscribes.
pub struct Subscription {
    sink: Arc<Sink>,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(sink: Arc<Sink>, release: Box<dyn FnOnce() + Send + Sync>) -> Self {
        Self {
            sink,
            release: Some(release),
        }
    }

    /// Normalized path this subscription listens to
    pub fn path(&self) -> &Path {
        self.sink.path()
    }

    /// Mute delivery until [`resume`](Self::resume) is called
    pub fn suspend(&self) {
        self.sink.suspended.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.sink.suspended.store(false, Ordering::Release);
    }

    pub fn is_suspended(&self) -> bool {
        self.sink.suspended.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.sink.path)
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Normalize a file path so that two spellings of the same file compare equal.
///
/// The result is absolute, with the parent directory canonicalized when it
/// exists, and case-folded on case-insensitive file systems.
pub fn normalize_path(path: &Path) -> WatchResult<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| WatchError::Normalize {
        path: path.to_path_buf(),
        source: e,
    })?;
    let (Some(parent), Some(file_name)) = (absolute.parent(), absolute.file_name()) else {
        return Err(WatchError::NotAFile(absolute));
    };
    let parent = parent
        .canonicalize()
        .unwrap_or_else(|_| parent.to_path_buf());
    Ok(fold_case(parent.join(file_name)))
}

#[cfg(any(windows, target_os = "macos"))]
pub(crate) fn fold_case(path: PathBuf) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase())
}

#[cfg(not(any(windows, target_os = "macos")))]
pub(crate) fn fold_case(path: PathBuf) -> PathBuf {
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    #[test]
    fn normalize_resolves_relative_segments() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();

        let direct = normalize_path(&temp.path().join("file.json")).unwrap();
        let roundabout = normalize_path(&temp.path().join("sub/../file.json")).unwrap();

        assert_eq!(direct, roundabout);
        assert!(direct.is_absolute());
    }

    #[test]
    fn normalize_rejects_root() {
        assert!(matches!(
            normalize_path(Path::new("/")),
            Err(WatchError::NotAFile(_))
        ));
    }

    #[test]
    fn sink_filters_on_exact_path() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sink = Sink::new(
            PathBuf::from("/tmp/a.json"),
            Arc::new(move |_: &Path| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        sink.deliver(Path::new("/tmp/b.json"));
        sink.deliver(Path::new("/tmp/a.json"));
        sink.suspended.store(true, Ordering::SeqCst);
        sink.deliver(Path::new("/tmp/a.json"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn watch_mode_display() {
        assert_eq!(WatchMode::Native.to_string(), "native");
        assert_eq!(WatchMode::Polling.to_string(), "polling");
    }
}
