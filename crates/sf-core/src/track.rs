//! Stable track identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque track identifier
///
/// Independent of the track's position in a signal. A track that is
/// deleted and restored through undo keeps its id, so undo actions that
/// refer to it stay valid across any number of history levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

// Global ID counter for generating unique IDs
static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

impl TrackId {
    /// Allocate a fresh, process-wide unique id
    pub fn generate() -> Self {
        Self(NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track#{}", self.0)
    }
}
