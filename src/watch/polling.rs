//! Polling multiplexer for file systems without native notification
//!
//! A single background thread stats every watched file once per interval
//! and compares (mtime, len) fingerprints. With nothing to watch it blocks
//! on a condvar instead of ticking, and a new subscription wakes it at once.

use super::{normalize_path, ChangeCallback, ChangeSource, Sink, Subscription};
use super::{WatchError, WatchResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

struct Watched {
    sink: Arc<Sink>,
    fingerprint: Option<Fingerprint>,
}

#[derive(Default)]
struct PollState {
    watched: Vec<Watched>,
    stopped: bool,
}

struct PollShared {
    state: Mutex<PollState>,
    wake: Condvar,
    interval: Duration,
    scans: AtomicU64,
}

/// Interval-based change detection on a single background thread
pub struct PollingMultiplexer {
    shared: Arc<PollShared>,
    worker: Option<JoinHandle<()>>,
}

impl PollingMultiplexer {
    /// Start the polling thread; it stays parked until something is watched
    pub fn new(interval: Duration) -> WatchResult<Self> {
        let shared = Arc::new(PollShared {
            state: Mutex::new(PollState::default()),
            wake: Condvar::new(),
            interval,
            scans: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("docstash-poll".to_string())
            .spawn(move || run(&worker_shared))
            .map_err(WatchError::Spawn)?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Number of completed scans since start
    pub fn scan_count(&self) -> u64 {
        self.shared.scans.load(Ordering::Acquire)
    }

    /// Number of live subscriptions
    pub fn watched_count(&self) -> usize {
        self.shared.state.lock().watched.len()
    }
}

impl ChangeSource for PollingMultiplexer {
    fn subscribe(&self, path: &Path, on_change: ChangeCallback) -> WatchResult<Subscription> {
        let path = normalize_path(path)?;
        let fingerprint = Fingerprint::of(&path);
        let sink = Arc::new(Sink::new(path, on_change));

        {
            let mut state = self.shared.state.lock();
            state.watched.push(Watched {
                sink: Arc::clone(&sink),
                fingerprint,
            });
            debug!("Polling {} ({} watched)", sink.path().display(), state.watched.len());
        }
        self.shared.wake.notify_all();

        let shared = Arc::downgrade(&self.shared);
        let released = Arc::clone(&sink);
        Ok(Subscription::new(
            sink,
            Box::new(move || release(&shared, &released)),
        ))
    }

    fn name(&self) -> &'static str {
        "polling"
    }
}

impl Drop for PollingMultiplexer {
    fn drop(&mut self) {
        self.shared.state.lock().stopped = true;
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn release(shared: &Weak<PollShared>, sink: &Arc<Sink>) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    shared
        .state
        .lock()
        .watched
        .retain(|w| !Arc::ptr_eq(&w.sink, sink));
}

fn run(shared: &PollShared) {
    let mut state = shared.state.lock();
    loop {
        if state.stopped {
            break;
        }
        if state.watched.is_empty() {
            shared.wake.wait(&mut state);
            continue;
        }

        let changed = scan(&mut state);
        shared.scans.fetch_add(1, Ordering::AcqRel);

        if !changed.is_empty() {
            // Callbacks may subscribe or unsubscribe, so run them unlocked
            MutexGuard::unlocked(&mut state, || {
                for sink in &changed {
                    sink.deliver(sink.path());
                }
            });
        }

        if !state.stopped && !state.watched.is_empty() {
            shared.wake.wait_for(&mut state, shared.interval);
        }
    }
    debug!("Polling thread stopped");
}

fn scan(state: &mut PollState) -> Vec<Arc<Sink>> {
    let mut changed = Vec::new();
    for watched in &mut state.watched {
        let current = Fingerprint::of(watched.sink.path());
        if current.is_some() && current != watched.fingerprint {
            changed.push(Arc::clone(&watched.sink));
        }
        watched.fingerprint = current;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;
    use tempfile::TempDir;

    fn counter() -> (Arc<AtomicUsize>, ChangeCallback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        (
            hits,
            Arc::new(move |_: &Path| {
                inner.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn idle_when_nothing_watched() {
        let mux = PollingMultiplexer::new(Duration::from_millis(20)).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(mux.scan_count(), 0);
    }

    #[test]
    fn subscribe_wakes_immediately() {
        let temp = TempDir::new().unwrap();
        // An interval far longer than the test: only the wake-up can trigger a scan
        let mux = PollingMultiplexer::new(Duration::from_secs(60)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(mux.scan_count(), 0);

        let (_, cb) = counter();
        let _sub = mux.subscribe(&temp.path().join("file.txt"), cb).unwrap();

        assert!(wait_for(Duration::from_secs(2), || mux.scan_count() >= 1));
    }

    #[test]
    fn detects_modification() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file.txt");
        std::fs::write(&path, "one").unwrap();

        let mux = PollingMultiplexer::new(Duration::from_millis(25)).unwrap();
        let (hits, cb) = counter();
        let _sub = mux.subscribe(&path, cb).unwrap();
        assert!(wait_for(Duration::from_secs(2), || mux.scan_count() >= 1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        std::fs::write(&path, "two, longer").unwrap();
        assert!(wait_for(Duration::from_secs(2), || hits.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn suspended_subscription_is_silent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file.txt");
        std::fs::write(&path, "one").unwrap();

        let mux = PollingMultiplexer::new(Duration::from_millis(25)).unwrap();
        let (hits, cb) = counter();
        let sub = mux.subscribe(&path, cb).unwrap();
        sub.suspend();

        std::fs::write(&path, "two, longer").unwrap();
        let before = mux.scan_count();
        assert!(wait_for(Duration::from_secs(2), || mux.scan_count() >= before + 2));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_returns_to_idle() {
        let temp = TempDir::new().unwrap();
        let mux = PollingMultiplexer::new(Duration::from_millis(20)).unwrap();
        let (_, cb) = counter();

        let sub = mux.subscribe(&temp.path().join("file.txt"), cb).unwrap();
        assert_eq!(mux.watched_count(), 1);
        drop(sub);
        assert_eq!(mux.watched_count(), 0);

        std::thread::sleep(Duration::from_millis(60));
        let settled = mux.scan_count();
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(mux.scan_count(), settled);
    }
}
