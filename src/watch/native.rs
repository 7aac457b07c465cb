//! Native (OS notification) multiplexer
//!
//! One non-recursive `notify` watch per directory, shared by every
//! subscription on a file in that directory. The registry lock covers both
//! join-or-create and the last-unsubscribe teardown, so a subscribe racing
//! with a teardown either joins a live entry or builds a fresh one.

use super::{fold_case, normalize_path, ChangeCallback, ChangeSource, Sink, Subscription};
use super::{WatchError, WatchResult};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

type Registry = Mutex<HashMap<PathBuf, WatchedDirectory>>;

/// One OS watch and the sinks of every file subscribed in that directory
struct WatchedDirectory {
    sinks: Arc<RwLock<Vec<Arc<Sink>>>>,
    refs: usize,
    // Dropping this closes the OS watch
    _watcher: RecommendedWatcher,
}

impl WatchedDirectory {
    fn open(dir: &Path) -> WatchResult<Self> {
        let sinks: Arc<RwLock<Vec<Arc<Sink>>>> = Arc::default();
        let dispatch = Arc::clone(&sinks);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_change(&event.kind) {
                    return;
                }
                let targets = dispatch.read().clone();
                for path in event.paths {
                    let path = fold_case(path);
                    for sink in &targets {
                        sink.deliver(&path);
                    }
                }
            }
            Err(e) => warn!("File watcher error: {}", e),
        })
        .map_err(WatchError::Create)?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::WatchPath {
                path: dir.to_path_buf(),
                source: e,
            })?;

        debug!("Opened watch on {}", dir.display());
        Ok(Self {
            sinks,
            refs: 0,
            _watcher: watcher,
        })
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Ref-counted OS watches keyed by directory
#[derive(Default)]
pub struct NativeMultiplexer {
    registry: Arc<Registry>,
}

impl NativeMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of directories with an open OS watch
    pub fn watched_directories(&self) -> usize {
        self.registry.lock().len()
    }

    /// Number of live subscriptions sharing the watch on `dir`
    pub fn subscriber_count(&self, dir: &Path) -> usize {
        let Ok(dir) = dir.canonicalize() else {
            return 0;
        };
        self.registry
            .lock()
            .get(&fold_case(dir))
            .map_or(0, |watched| watched.refs)
    }
}

impl ChangeSource for NativeMultiplexer {
    fn subscribe(&self, path: &Path, on_change: ChangeCallback) -> WatchResult<Subscription> {
        let path = normalize_path(path)?;
        let dir = path
            .parent()
            .ok_or_else(|| WatchError::NotAFile(path.clone()))?
            .to_path_buf();
        let sink = Arc::new(Sink::new(path, on_change));

        {
            let mut registry = self.registry.lock();
            let watched = match registry.entry(dir.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(WatchedDirectory::open(&dir)?),
            };
            watched.refs += 1;
            watched.sinks.write().push(Arc::clone(&sink));
            debug!(
                "Subscribed {} ({} in directory)",
                sink.path().display(),
                watched.refs
            );
        }

        let registry = Arc::downgrade(&self.registry);
        let released = Arc::clone(&sink);
        Ok(Subscription::new(
            sink,
            Box::new(move || release(&registry, &dir, &released)),
        ))
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

fn release(registry: &Weak<Registry>, dir: &Path, sink: &Arc<Sink>) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let mut registry = registry.lock();
    let Some(watched) = registry.get_mut(dir) else {
        return;
    };

    watched.sinks.write().retain(|s| !Arc::ptr_eq(s, sink));
    watched.refs = watched.refs.saturating_sub(1);

    if watched.refs == 0 {
        registry.remove(dir);
        debug!("Closed watch on {}", dir.display());
    }
}
