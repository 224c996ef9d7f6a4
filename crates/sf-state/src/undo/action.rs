//! Undo actions
//!
//! Every action captures enough state to invert one mutation. Actions are
//! created right before (deletions, overwrites) or right after (insertions)
//! the mutation they describe, `store()` snapshots whatever is about to be
//! lost, and `undo()` applies the inverse.
//!
//! `undo()` consumes the action. With `with_redo` set it hands back the
//! action that reverts the undo again, either a new one (insert becomes
//! delete and vice versa) or the same object with its buffer swapped.
//! `Ok(None)` with `with_redo` set means the redo state could not be
//! captured; the undo itself still happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sf_core::{SAMPLE_STORAGE_BYTES, Sample, SfError, SfResult, TrackId};
use sf_file::FileInfo;
use sf_signal::{Signal, Track, TrackSnapshot};

use crate::{SelectionState, SignalManager};

const SAMPLE_BYTES: usize = SAMPLE_STORAGE_BYTES;

fn track_of(signal: &Signal, id: TrackId) -> SfResult<(usize, Arc<Track>)> {
    let index = signal
        .index_of(id)
        .ok_or_else(|| SfError::State(format!("{} is not part of the signal", id)))?;
    let track = signal
        .track(index)
        .ok_or_else(|| SfError::State(format!("{} vanished", id)))?;
    Ok((index, track))
}

/// Samples of `[offset, offset + length)` that exist on a track of `total`
pub(crate) fn clip_length(offset: u64, length: u64, total: u64) -> u64 {
    length.min(total.saturating_sub(offset))
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Selected range and selected tracks
#[derive(Debug, Default)]
pub struct UndoSelection {
    state: SelectionState,
}

impl UndoSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot taken by the caller; keeps the size estimate exact
    pub fn with_state(state: SelectionState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    fn store(&mut self, manager: &SignalManager) -> SfResult<()> {
        self.state = manager.selection_state();
        Ok(())
    }

    fn undo(mut self, manager: &SignalManager, with_redo: bool) -> SfResult<Option<UndoAction>> {
        let current = manager.selection_state();
        manager.apply_selection_state(&self.state);
        if with_redo {
            self.state = current;
            return Ok(Some(UndoAction::Selection(self)));
        }
        Ok(None)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAMPLE RANGES
// ═══════════════════════════════════════════════════════════════════════════════

/// Samples about to be deleted from one track
#[derive(Debug)]
pub struct UndoDeleteRange {
    track: TrackId,
    offset: u64,
    length: u64,
    samples: Vec<Sample>,
}

impl UndoDeleteRange {
    pub fn new(track: TrackId, offset: u64, length: u64) -> Self {
        Self {
            track,
            offset,
            length,
            samples: Vec::new(),
        }
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    fn undo_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.length as usize * SAMPLE_BYTES
    }

    fn store(&mut self, manager: &SignalManager) -> SfResult<()> {
        let (_, track) = track_of(manager.signal(), self.track)?;
        self.samples = track.read(self.offset, self.length)?;
        Ok(())
    }

    fn undo(self, manager: &SignalManager, with_redo: bool) -> SfResult<Option<UndoAction>> {
        let signal = manager.signal();
        let (index, _) = track_of(signal, self.track)?;
        signal.insert_samples(index, self.offset, &self.samples)?;
        Ok(with_redo.then(|| {
            UndoAction::InsertRange(UndoInsertRange::new(self.track, self.offset, self.length))
        }))
    }
}

/// Samples inserted into one track
///
/// The length may still grow after registration when a streaming writer
/// reports through the shared counter.
#[derive(Debug)]
pub struct UndoInsertRange {
    track: TrackId,
    offset: u64,
    length: Arc<AtomicU64>,
}

impl UndoInsertRange {
    pub fn new(track: TrackId, offset: u64, length: u64) -> Self {
        Self::with_length_observer(track, offset, Arc::new(AtomicU64::new(length)))
    }

    /// Length taken from a writer's length observer
    pub fn with_length_observer(track: TrackId, offset: u64, length: Arc<AtomicU64>) -> Self {
        Self { track, offset, length }
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    pub fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn redo_size(&self) -> usize {
        std::mem::size_of::<UndoDeleteRange>() + self.length() as usize * SAMPLE_BYTES
    }

    fn undo(self, manager: &SignalManager, with_redo: bool) -> SfResult<Option<UndoAction>> {
        let signal = manager.signal();
        let (index, track) = track_of(signal, self.track)?;
        let length = clip_length(self.offset, self.length(), track.length());

        let redo = if with_redo {
            let mut redo = UndoDeleteRange::new(self.track, self.offset, length);
            match redo.store(manager) {
                Ok(()) => Some(UndoAction::DeleteRange(redo)),
                Err(err) => {
                    log::warn!("no redo for insert on {}: {}", self.track, err);
                    None
                }
            }
        } else {
            None
        };
        signal.delete_range(index, self.offset, length)?;
        Ok(redo)
    }
}

/// Samples about to be overwritten in place
#[derive(Debug)]
pub struct UndoModifyRange {
    track: TrackId,
    offset: u64,
    length: u64,
    samples: Vec<Sample>,
}

impl UndoModifyRange {
    pub fn new(track: TrackId, offset: u64, length: u64) -> Self {
        Self {
            track,
            offset,
            length,
            samples: Vec::new(),
        }
    }

    fn size(&self) -> usize {
        std::mem::size_of::<Self>() + self.length as usize * SAMPLE_BYTES
    }

    fn store(&mut self, manager: &SignalManager) -> SfResult<()> {
        let (_, track) = track_of(manager.signal(), self.track)?;
        self.samples = track.read(self.offset, self.length)?;
        Ok(())
    }

    fn undo(mut self, manager: &SignalManager, with_redo: bool) -> SfResult<Option<UndoAction>> {
        let signal = manager.signal();
        let (index, track) = track_of(signal, self.track)?;
        let current = if with_redo {
            match track.read(self.offset, self.length) {
                Ok(samples) => Some(samples),
                Err(err) => {
                    log::warn!("no redo for modification on {}: {}", self.track, err);
                    None
                }
            }
        } else {
            None
        };
        signal.overwrite_samples(index, self.offset, &self.samples)?;
        Ok(current.map(|samples| {
            self.samples = samples;
            UndoAction::ModifyRange(self)
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRACKS
// ═══════════════════════════════════════════════════════════════════════════════

/// A track that was inserted at `index`
#[derive(Debug)]
pub struct UndoInsertTrack {
    index: usize,
    track: TrackId,
}

impl UndoInsertTrack {
    pub fn new(index: usize, track: TrackId) -> Self {
        Self { index, track }
    }

    fn undo(self, manager: &SignalManager, with_redo: bool) -> SfResult<Option<UndoAction>> {
        let signal = manager.signal();
        let (index, track) = track_of(signal, self.track)?;
        let redo = if with_redo {
            let mut redo = UndoDeleteTrack::new(index, self.track, track.length());
            match redo.store(manager) {
                Ok(()) => Some(UndoAction::DeleteTrack(redo)),
                Err(err) => {
                    log::warn!("no redo for track insert of {}: {}", self.track, err);
                    None
                }
            }
        } else {
            None
        };
        drop(track);
        signal.delete_track(index)?;
        Ok(redo)
    }
}

/// A track about to be deleted, restored with its identity
#[derive(Debug)]
pub struct UndoDeleteTrack {
    index: usize,
    track: TrackId,
    length: u64,
    snapshot: Option<TrackSnapshot>,
}

impl UndoDeleteTrack {
    pub fn new(index: usize, track: TrackId, length: u64) -> Self {
        Self {
            index,
            track,
            length,
            snapshot: None,
        }
    }

    fn undo_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.length as usize * SAMPLE_BYTES
    }

    fn store(&mut self, manager: &SignalManager) -> SfResult<()> {
        let (_, track) = track_of(manager.signal(), self.track)?;
        let snapshot = track.snapshot()?;
        self.length = snapshot.length();
        self.snapshot = Some(snapshot);
        Ok(())
    }

    fn undo(self, manager: &SignalManager, with_redo: bool) -> SfResult<Option<UndoAction>> {
        let snapshot = self
            .snapshot
            .ok_or_else(|| SfError::State(format!("no content stored for {}", self.track)))?;
        let signal = manager.signal();
        let index = self.index.min(signal.track_count());
        signal.restore_track(index, snapshot)?;
        Ok(with_redo.then(|| UndoAction::InsertTrack(UndoInsertTrack::new(index, self.track))))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE INFO
// ═══════════════════════════════════════════════════════════════════════════════

/// Metadata before a change
#[derive(Debug, Default)]
pub struct UndoFileInfo {
    info: FileInfo,
}

impl UndoFileInfo {
    pub fn new(info: FileInfo) -> Self {
        Self { info }
    }

    fn store(&mut self, manager: &SignalManager) -> SfResult<()> {
        self.info = manager.file_info();
        Ok(())
    }

    fn undo(mut self, manager: &SignalManager, with_redo: bool) -> SfResult<Option<UndoAction>> {
        let current = manager.swap_file_info(std::mem::take(&mut self.info));
        if with_redo {
            self.info = current;
            return Ok(Some(UndoAction::FileInfo(self)));
        }
        Ok(None)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum UndoAction {
    Selection(UndoSelection),
    DeleteRange(UndoDeleteRange),
    InsertRange(UndoInsertRange),
    ModifyRange(UndoModifyRange),
    InsertTrack(UndoInsertTrack),
    DeleteTrack(UndoDeleteTrack),
    FileInfo(UndoFileInfo),
}

impl UndoAction {
    pub fn description(&self) -> &'static str {
        match self {
            UndoAction::Selection(_) => "Selection",
            UndoAction::DeleteRange(_) => "Delete",
            UndoAction::InsertRange(_) => "Insert",
            UndoAction::ModifyRange(_) => "Modify",
            UndoAction::InsertTrack(_) => "Insert Track",
            UndoAction::DeleteTrack(_) => "Delete Track",
            UndoAction::FileInfo(_) => "File Info",
        }
    }

    /// Memory held while the action waits in a buffer
    pub fn undo_size(&self) -> usize {
        match self {
            UndoAction::Selection(a) => std::mem::size_of::<UndoSelection>() + a.state.memory(),
            UndoAction::DeleteRange(a) => a.undo_size(),
            UndoAction::InsertRange(_) => std::mem::size_of::<UndoInsertRange>(),
            UndoAction::ModifyRange(a) => a.size(),
            UndoAction::InsertTrack(_) => std::mem::size_of::<UndoInsertTrack>(),
            UndoAction::DeleteTrack(a) => a.undo_size(),
            UndoAction::FileInfo(a) => std::mem::size_of::<UndoFileInfo>() + a.info.memory(),
        }
    }

    /// Estimated memory of the action `undo()` produces
    pub fn redo_size(&self) -> usize {
        match self {
            UndoAction::DeleteRange(_) => std::mem::size_of::<UndoInsertRange>(),
            UndoAction::InsertRange(a) => a.redo_size(),
            UndoAction::InsertTrack(_) => std::mem::size_of::<UndoDeleteTrack>(),
            UndoAction::DeleteTrack(_) => std::mem::size_of::<UndoInsertTrack>(),
            other => other.undo_size(),
        }
    }

    /// False only for actions that merely restore the selection
    pub fn contains_modification(&self) -> bool {
        !matches!(self, UndoAction::Selection(_))
    }

    /// Snapshot the state the action will restore
    pub fn store(&mut self, manager: &SignalManager) -> SfResult<()> {
        match self {
            UndoAction::Selection(a) => a.store(manager),
            UndoAction::DeleteRange(a) => a.store(manager),
            UndoAction::InsertRange(_) => Ok(()),
            UndoAction::ModifyRange(a) => a.store(manager),
            UndoAction::InsertTrack(_) => Ok(()),
            UndoAction::DeleteTrack(a) => a.store(manager),
            UndoAction::FileInfo(a) => a.store(manager),
        }
    }

    pub fn undo(self, manager: &SignalManager, with_redo: bool) -> SfResult<Option<UndoAction>> {
        match self {
            UndoAction::Selection(a) => a.undo(manager, with_redo),
            UndoAction::DeleteRange(a) => a.undo(manager, with_redo),
            UndoAction::InsertRange(a) => a.undo(manager, with_redo),
            UndoAction::ModifyRange(a) => a.undo(manager, with_redo),
            UndoAction::InsertTrack(a) => a.undo(manager, with_redo),
            UndoAction::DeleteTrack(a) => a.undo(manager, with_redo),
            UndoAction::FileInfo(a) => a.undo(manager, with_redo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_length() {
        assert_eq!(clip_length(0, 10, 100), 10);
        assert_eq!(clip_length(95, 10, 100), 5);
        assert_eq!(clip_length(120, 10, 100), 0);
    }

    #[test]
    fn test_sizes_and_modification() {
        let delete = UndoAction::DeleteRange(UndoDeleteRange::new(TrackId(1), 0, 1000));
        assert!(delete.undo_size() >= 1000 * SAMPLE_BYTES);
        assert!(delete.redo_size() < 1000);
        assert!(delete.contains_modification());

        let insert = UndoAction::InsertRange(UndoInsertRange::new(TrackId(1), 0, 1000));
        assert!(insert.undo_size() < 1000);
        assert!(insert.redo_size() >= 1000 * SAMPLE_BYTES);

        let selection = UndoAction::Selection(UndoSelection::new());
        assert!(!selection.contains_modification());
        assert_eq!(selection.description(), "Selection");
    }

    #[test]
    fn test_insert_length_follows_observer() {
        let observer = Arc::new(AtomicU64::new(0));
        let insert = UndoInsertRange::with_length_observer(TrackId(3), 10, Arc::clone(&observer));
        observer.fetch_add(512, Ordering::Relaxed);
        assert_eq!(insert.length(), 512);
        insert.set_length(7);
        assert_eq!(observer.load(Ordering::Relaxed), 7);
    }
}
