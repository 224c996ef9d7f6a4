//! Selected sample range

use serde::{Deserialize, Serialize};
use sf_core::{SampleRange, TrackId};

/// Range on the sample axis shared by all selected tracks
///
/// A zero length means "no range selected", the offset still marks the
/// cursor position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub offset: u64,
    pub length: u64,
}

impl Selection {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    pub fn range(&self) -> SampleRange {
        SampleRange::new(self.offset, self.length)
    }

    pub fn first(&self) -> u64 {
        self.offset
    }

    /// Last selected sample, equal to `first()` for an empty selection
    pub fn last(&self) -> u64 {
        self.offset + self.length.saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Fit into `[0, total)`
    pub fn clamped(&self, total: u64) -> Self {
        let offset = self.offset.min(total);
        let length = self.length.min(total - offset);
        Self { offset, length }
    }
}

/// Sample range plus the identities of the selected tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub range: Selection,
    pub tracks: Vec<TrackId>,
}

impl SelectionState {
    pub fn memory(&self) -> usize {
        std::mem::size_of::<Self>() + self.tracks.len() * std::mem::size_of::<TrackId>()
    }
}
