//! Transfer progress and cooperative cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared progress counter of a running load or save
///
/// Codecs report bytes through [`TransferProgress::advance`]; the cancel
/// flag is shared with every writer of the transfer so a cancellation also
/// stops samples from reaching the tracks.
#[derive(Debug, Default)]
pub struct TransferProgress {
    processed: AtomicU64,
    total: AtomicU64,
    cancel: Arc<AtomicBool>,
}

impl TransferProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, bytes: u64) {
        self.total.store(bytes, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn advance(&self, bytes: u64) {
        self.processed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Progress in `0.0..=1.0`, zero while the total is unknown
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.processed() as f64 / total as f64).min(1.0)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Flag to hand to writers and worker threads
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn reset(&self) {
        self.processed.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
        self.cancel.store(false, Ordering::Release);
    }
}
