//! Signal: ordered collection of tracks
//!
//! The signal owns the track list and forwards every track change to its
//! event sink with the originating track index attached. Track handles are
//! reference counted so readers and writers on worker threads can outlive
//! a concurrent reordering of the list.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use sf_core::{Sample, SampleRange, SfError, SfResult, TrackId};

use crate::{
    InsertMode, LockMode, ReaderMode, SampleReader, SampleWriter, SignalEvent, SignalEventSink,
    Track, TrackChange, TrackSnapshot,
};

struct SignalInner {
    tracks: RwLock<Vec<Arc<Track>>>,
    sink: RwLock<Option<Arc<dyn SignalEventSink>>>,
}

/// Shared handle to a multi-track signal
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("tracks", &self.track_count())
            .field("length", &self.length())
            .finish()
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                tracks: RwLock::new(Vec::new()),
                sink: RwLock::new(None),
            }),
        }
    }

    /// Install the receiver of all change notifications
    pub fn set_event_sink(&self, sink: Arc<dyn SignalEventSink>) {
        *self.inner.sink.write() = Some(sink);
    }

    pub fn clear_event_sink(&self) {
        *self.inner.sink.write() = None;
    }

    pub(crate) fn emit(&self, event: SignalEvent) {
        let sink = self.inner.sink.read().clone();
        if let Some(sink) = sink {
            sink.signal_event(&event);
        }
    }

    fn emit_change(&self, track: &Track, change: TrackChange) {
        if let Some(index) = self.index_of(track.id())
            && let Some(event) = change.into_event(index)
        {
            self.emit(event);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TRACK LIST
    // ═══════════════════════════════════════════════════════════════════════

    pub fn track_count(&self) -> usize {
        self.inner.tracks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.track_count() == 0
    }

    /// Indices of all tracks
    pub fn all_tracks(&self) -> Vec<usize> {
        (0..self.track_count()).collect()
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.inner.tracks.read().iter().map(|t| t.id()).collect()
    }

    pub fn track(&self, index: usize) -> Option<Arc<Track>> {
        self.inner.tracks.read().get(index).cloned()
    }

    fn track_checked(&self, index: usize) -> SfResult<Arc<Track>> {
        self.track(index)
            .ok_or_else(|| SfError::Range(format!("no track with index {}", index)))
    }

    pub fn track_by_id(&self, id: TrackId) -> Option<Arc<Track>> {
        self.inner.tracks.read().iter().find(|t| t.id() == id).cloned()
    }

    pub fn index_of(&self, id: TrackId) -> Option<usize> {
        self.inner.tracks.read().iter().position(|t| t.id() == id)
    }

    /// Length of the longest track
    pub fn length(&self) -> u64 {
        self.inner
            .tracks
            .read()
            .iter()
            .map(|t| t.length())
            .max()
            .unwrap_or(0)
    }

    /// Append a track of `length` zero samples
    pub fn append_track(&self, length: u64) -> SfResult<Arc<Track>> {
        let index = self.track_count();
        self.insert_track(index, length)
    }

    /// Insert a track of `length` zero samples before `index`
    pub fn insert_track(&self, index: usize, length: u64) -> SfResult<Arc<Track>> {
        self.insert_track_object(index, Track::with_length(length)?)
    }

    /// Put a previously deleted track back, keeping its identity
    pub fn restore_track(&self, index: usize, snapshot: TrackSnapshot) -> SfResult<Arc<Track>> {
        if self.index_of(snapshot.id).is_some() {
            return Err(SfError::State(format!("{} is already part of the signal", snapshot.id)));
        }
        self.insert_track_object(index, Track::from_snapshot(snapshot))
    }

    fn insert_track_object(&self, index: usize, track: Track) -> SfResult<Arc<Track>> {
        let track = Arc::new(track);
        {
            let mut tracks = self.inner.tracks.write();
            if index > tracks.len() {
                return Err(SfError::Range(format!(
                    "track index {} > track count {}",
                    index,
                    tracks.len()
                )));
            }
            tracks.try_reserve(1)?;
            tracks.insert(index, Arc::clone(&track));
        }
        log::debug!("inserted {} at index {}", track.id(), index);
        self.emit(SignalEvent::TrackInserted { index, id: track.id() });
        Ok(track)
    }

    /// Remove a track from the signal and hand it out
    pub fn delete_track(&self, index: usize) -> SfResult<Arc<Track>> {
        let track = {
            let mut tracks = self.inner.tracks.write();
            if index >= tracks.len() {
                return Err(SfError::Range(format!(
                    "track index {} >= track count {}",
                    index,
                    tracks.len()
                )));
            }
            tracks.remove(index)
        };
        // wait for readers and writers still working on it
        drop(track.lock_range(LockMode::Exclusive, SampleRange::new(0, u64::MAX)));
        log::debug!("deleted {} from index {}", track.id(), index);
        self.emit(SignalEvent::TrackDeleted { index, id: track.id() });
        Ok(track)
    }

    /// Delete all tracks, last one first
    pub fn close(&self) {
        while let Some(index) = self.track_count().checked_sub(1) {
            if let Err(err) = self.delete_track(index) {
                log::warn!("closing signal: {}", err);
                break;
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SELECTION FLAGS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn track_selected(&self, index: usize) -> bool {
        self.track(index).map(|t| t.selected()).unwrap_or(false)
    }

    pub fn selected_tracks(&self) -> Vec<usize> {
        self.inner
            .tracks
            .read()
            .iter()
            .enumerate()
            .filter(|(_, t)| t.selected())
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns whether the flag changed
    pub fn select_track(&self, index: usize, selected: bool) -> SfResult<bool> {
        let track = self.track_checked(index)?;
        let changed = track.set_selected(selected);
        if changed {
            self.emit(SignalEvent::TrackSelectionChanged { track: index, selected });
        }
        Ok(changed)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SAMPLE ACCESS
    // ═══════════════════════════════════════════════════════════════════════

    /// One-shot copy, does not take a range lock
    pub fn read_samples(&self, track: usize, offset: u64, count: u64) -> SfResult<Vec<Sample>> {
        self.track_checked(track)?.read(offset, count)
    }

    pub fn insert_samples(&self, track: usize, offset: u64, samples: &[Sample]) -> SfResult<()> {
        let t = self.track_checked(track)?;
        let change = {
            let _lock = t.lock_range(LockMode::Exclusive, SampleRange::new(offset, u64::MAX - offset));
            t.insert(offset, samples)?
        };
        self.emit_change(&t, change);
        Ok(())
    }

    pub fn append_samples(&self, track: usize, samples: &[Sample]) -> SfResult<()> {
        let t = self.track_checked(track)?;
        let change = {
            let end = t.length();
            let _lock = t.lock_range(LockMode::Exclusive, SampleRange::new(end, u64::MAX - end));
            t.append(samples)?
        };
        self.emit_change(&t, change);
        Ok(())
    }

    pub fn overwrite_samples(&self, track: usize, offset: u64, samples: &[Sample]) -> SfResult<()> {
        let t = self.track_checked(track)?;
        let change = {
            let _lock = t.lock_range(
                LockMode::Exclusive,
                SampleRange::new(offset, samples.len() as u64),
            );
            t.overwrite(offset, samples)?
        };
        self.emit_change(&t, change);
        Ok(())
    }

    pub fn insert_space(&self, track: usize, offset: u64, length: u64) -> SfResult<()> {
        let t = self.track_checked(track)?;
        let change = {
            let _lock = t.lock_range(LockMode::Exclusive, SampleRange::new(offset, u64::MAX - offset));
            t.insert_space(offset, length)?
        };
        self.emit_change(&t, change);
        Ok(())
    }

    pub fn delete_range(&self, track: usize, offset: u64, length: u64) -> SfResult<()> {
        let t = self.track_checked(track)?;
        let change = {
            let _lock = t.lock_range(LockMode::Exclusive, SampleRange::new(offset, u64::MAX - offset));
            t.delete_range(offset, length)?
        };
        self.emit_change(&t, change);
        Ok(())
    }

    /// Reader over `[left, right]` of one track
    ///
    /// `right == left - 1` opens an empty reader; use
    /// [`Signal::open_range_reader`] for an empty range at offset zero.
    pub fn open_reader(
        &self,
        mode: ReaderMode,
        track: usize,
        left: u64,
        right: u64,
    ) -> SfResult<SampleReader> {
        if right < left && right.wrapping_add(1) != left {
            return Err(SfError::Range(format!("reader range [{}, {}] is inverted", left, right)));
        }
        self.open_range_reader(mode, track, SampleRange::inclusive(left, right)?)
    }

    /// Reader over a half-open range of one track
    pub fn open_range_reader(
        &self,
        mode: ReaderMode,
        track: usize,
        range: SampleRange,
    ) -> SfResult<SampleReader> {
        let t = self.track_checked(track)?;
        SampleReader::new(t, mode, range)
    }

    /// Writer on one track
    ///
    /// `right` is only meaningful for [`InsertMode::Overwrite`]; a track
    /// shorter than `right + 1` is padded with silence first.
    pub fn open_writer(
        &self,
        mode: InsertMode,
        track: usize,
        left: u64,
        right: u64,
    ) -> SfResult<SampleWriter> {
        let t = self.track_checked(track)?;
        if mode == InsertMode::Overwrite {
            let needed = right.saturating_add(1);
            let length = t.length();
            if length < needed {
                self.insert_space(track, length, needed - length)?;
            }
        }
        SampleWriter::new(self.clone(), t, mode, left, right)
    }

    pub(crate) fn notify_written(&self, track: &Track, change: TrackChange) {
        self.emit_change(track, change);
    }
}
