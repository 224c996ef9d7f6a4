//! Range locks over a track's sample axis
//!
//! Two locks conflict iff their ranges overlap and at least one of them is
//! exclusive. Acquisition blocks until no conflicting lock is held.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use sf_core::SampleRange;

/// Access mode of a range lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Any number of shared holders may overlap
    Shared,
    /// Excludes every other holder of an overlapping range
    Exclusive,
}

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    id: u64,
    mode: LockMode,
    range: SampleRange,
}

impl LockEntry {
    fn conflicts(&self, mode: LockMode, range: &SampleRange) -> bool {
        self.range.overlaps(range) && !(self.mode == LockMode::Shared && mode == LockMode::Shared)
    }
}

/// Lock table of one track
#[derive(Debug, Default)]
pub struct RangeLockManager {
    held: Mutex<Vec<LockEntry>>,
    released: Condvar,
    next_id: AtomicU64,
}

impl RangeLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the range can be locked
    pub fn lock(self: &Arc<Self>, mode: LockMode, range: SampleRange) -> RangeLock {
        let mut held = self.held.lock();
        while held.iter().any(|e| e.conflicts(mode, &range)) {
            self.released.wait(&mut held);
        }
        self.insert(&mut held, mode, range)
    }

    /// Lock without blocking, `None` on conflict
    pub fn try_lock(self: &Arc<Self>, mode: LockMode, range: SampleRange) -> Option<RangeLock> {
        let mut held = self.held.lock();
        if held.iter().any(|e| e.conflicts(mode, &range)) {
            return None;
        }
        Some(self.insert(&mut held, mode, range))
    }

    /// Like [`lock`](Self::lock) but gives up after `timeout`
    pub fn lock_timeout(
        self: &Arc<Self>,
        mode: LockMode,
        range: SampleRange,
        timeout: Duration,
    ) -> Option<RangeLock> {
        let mut held = self.held.lock();
        while held.iter().any(|e| e.conflicts(mode, &range)) {
            if self.released.wait_for(&mut held, timeout).timed_out() {
                if held.iter().any(|e| e.conflicts(mode, &range)) {
                    return None;
                }
                break;
            }
        }
        Some(self.insert(&mut held, mode, range))
    }

    /// Number of currently held locks
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    fn insert(self: &Arc<Self>, held: &mut Vec<LockEntry>, mode: LockMode, range: SampleRange) -> RangeLock {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        held.push(LockEntry { id, mode, range });
        RangeLock {
            manager: Arc::clone(self),
            id,
            mode,
            range,
        }
    }

    fn release(&self, id: u64) {
        let mut held = self.held.lock();
        held.retain(|e| e.id != id);
        self.released.notify_all();
    }
}

/// Held range lock, released on drop
#[derive(Debug)]
pub struct RangeLock {
    manager: Arc<RangeLockManager>,
    id: u64,
    mode: LockMode,
    range: SampleRange,
}

impl RangeLock {
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn range(&self) -> SampleRange {
        self.range
    }
}

impl Drop for RangeLock {
    fn drop(&mut self) {
        self.manager.release(self.id);
    }
}
