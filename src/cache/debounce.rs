//! Single-slot debouncing
//!
//! Each request arms the slot with a target time and starts its own delay.
//! When a delay elapses it may act only if the slot still holds its target;
//! any newer request has replaced the target, so its later delay wins. A
//! burst of requests therefore produces one action, after the last one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Target slot shared by all pending delays. Zero means nothing pending.
#[derive(Debug)]
pub(crate) struct DebounceSlot {
    epoch: Instant,
    pending: AtomicU64,
}

impl DebounceSlot {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Instant::now(),
            pending: AtomicU64::new(0),
        }
    }

    /// Record a request; returns the target its delay must match
    pub(crate) fn arm(&self, window: Duration) -> u64 {
        let deadline = self.epoch.elapsed() + window;
        let wanted = u64::try_from(deadline.as_micros()).unwrap_or(u64::MAX);
        let mut armed = wanted;
        // Targets strictly increase so two requests never share one
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                armed = wanted.max(current.saturating_add(1)).max(1);
                Some(armed)
            });
        armed
    }

    /// Claim the slot if `target` is still the latest request
    pub(crate) fn claim(&self, target: u64) -> bool {
        self.pending
            .compare_exchange(target, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the slot whatever is pending; false if nothing was
    pub(crate) fn take(&self) -> bool {
        self.pending.swap(0, Ordering::AcqRel) != 0
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire) != 0
    }
}
