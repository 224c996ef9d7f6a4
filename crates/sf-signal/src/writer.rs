//! Buffered sample writer bound to one track
//!
//! Samples are collected in a small buffer and handed to the track in bulk.
//! `flush()` is idempotent and runs again on drop, so no exit path loses
//! buffered samples.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use sf_core::{Sample, SampleRange, SfError, SfResult, TrackId};

use crate::{LockMode, RangeLock, Signal, Track};

/// Default writer buffer size in samples
pub const WRITER_BUFFER_SAMPLES: usize = 16 * 1024;

/// Placement of written samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Always behind the current end of the track
    Append,
    /// Open a gap at `left` and fill it
    Insert,
    /// Replace `[left, right]` in place
    Overwrite,
}

#[derive(Debug)]
pub struct SampleWriter {
    signal: Signal,
    track: Arc<Track>,
    mode: InsertMode,
    first: u64,
    last: u64,
    position: u64,
    buffer: Vec<Sample>,
    capacity: usize,
    written: u64,
    cancel: Option<Arc<AtomicBool>>,
    observer: Option<Arc<AtomicU64>>,
    _lock: RangeLock,
}

impl SampleWriter {
    pub(crate) fn new(
        signal: Signal,
        track: Arc<Track>,
        mode: InsertMode,
        left: u64,
        right: u64,
    ) -> SfResult<Self> {
        let length = track.length();
        let (first, last, lock_range) = match mode {
            InsertMode::Append => (length, u64::MAX, SampleRange::new(length, u64::MAX - length)),
            InsertMode::Insert => {
                if left > length {
                    return Err(SfError::Range(format!(
                        "insert writer at {} behind track end {}",
                        left, length
                    )));
                }
                (left, u64::MAX, SampleRange::new(left, u64::MAX - left))
            }
            InsertMode::Overwrite => {
                if right < left || right >= length {
                    return Err(SfError::Range(format!(
                        "overwrite writer [{}, {}] outside track of length {}",
                        left, right, length
                    )));
                }
                (left, right, SampleRange::inclusive(left, right)?)
            }
        };
        let lock = track.lock_range(LockMode::Exclusive, lock_range);
        Ok(Self {
            signal,
            track,
            mode,
            first,
            last,
            position: first,
            buffer: Vec::new(),
            capacity: WRITER_BUFFER_SAMPLES,
            written: 0,
            cancel: None,
            observer: None,
            _lock: lock,
        })
    }

    /// Change the number of samples collected before a bulk flush
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Cooperative cancellation: once set, further writes are discarded
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Counter that receives the number of samples committed to the track
    pub fn with_length_observer(mut self, observer: Arc<AtomicU64>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn track_id(&self) -> TrackId {
        self.track.id()
    }

    pub fn mode(&self) -> InsertMode {
        self.mode
    }

    pub fn first(&self) -> u64 {
        self.first
    }

    /// Last writable position (`u64::MAX` unless overwriting)
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Position the next written sample will land on
    pub fn position(&self) -> u64 {
        self.position + self.buffer.len() as u64
    }

    /// Samples committed to the track so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    pub fn write(&mut self, samples: &[Sample]) -> SfResult<()> {
        if self.is_cancelled() {
            self.buffer.clear();
            return Err(SfError::Cancelled);
        }
        let end = self.position().saturating_add(samples.len() as u64);
        if self.mode == InsertMode::Overwrite && end > self.last.saturating_add(1) {
            return Err(SfError::Range(format!(
                "write up to {} behind writer end {}",
                end - 1,
                self.last
            )));
        }

        let mut rest = samples;
        while !rest.is_empty() {
            let room = self.capacity.saturating_sub(self.buffer.len()).max(1);
            let n = room.min(rest.len());
            self.buffer.try_reserve(n)?;
            self.buffer.extend_from_slice(&rest[..n]);
            rest = &rest[n..];
            if self.buffer.len() >= self.capacity {
                self.flush()?;
            }
        }
        Ok(())
    }

    pub fn write_sample(&mut self, sample: Sample) -> SfResult<()> {
        self.write(std::slice::from_ref(&sample))
    }

    /// Commit buffered samples to the track
    ///
    /// A failed flush drops the buffered samples, the track keeps its
    /// last consistent state.
    pub fn flush(&mut self) -> SfResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let buffer = std::mem::take(&mut self.buffer);
        let change = match self.mode {
            InsertMode::Append => self.track.append(&buffer)?,
            InsertMode::Insert => self.track.insert(self.position, &buffer)?,
            InsertMode::Overwrite => self.track.overwrite(self.position, &buffer)?,
        };
        let n = buffer.len() as u64;
        self.position += n;
        self.written += n;
        if let Some(observer) = &self.observer {
            observer.fetch_add(n, Ordering::Relaxed);
        }
        // reuse the allocation
        self.buffer = buffer;
        self.buffer.clear();
        self.signal.notify_written(&self.track, change);
        Ok(())
    }
}

impl Drop for SampleWriter {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            log::warn!("flushing writer on {} failed: {}", self.track.id(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SignalEvent, ReaderMode};
    use parking_lot::Mutex;

    #[test]
    fn test_append_writer_buffers_until_flush() {
        let signal = Signal::new();
        signal.append_track(0).unwrap();
        let mut writer = signal
            .open_writer(InsertMode::Append, 0, 0, 0)
            .unwrap()
            .with_buffer_capacity(8);
        writer.write(&[1, 2, 3]).unwrap();
        assert_eq!(signal.length(), 0);
        writer.write(&[4, 5, 6, 7, 8, 9]).unwrap();
        assert_eq!(signal.length(), 8);
        assert_eq!(writer.position(), 9);
        drop(writer);
        assert_eq!(signal.read_samples(0, 0, 9).unwrap(), (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn test_insert_writer_shifts_tail() {
        let signal = Signal::new();
        signal.append_track(0).unwrap();
        signal.append_samples(0, &[1, 2, 3]).unwrap();
        {
            let mut writer = signal.open_writer(InsertMode::Insert, 0, 1, 0).unwrap();
            writer.write(&[8, 9]).unwrap();
        }
        assert_eq!(signal.read_samples(0, 0, 5).unwrap(), vec![1, 8, 9, 2, 3]);
    }

    #[test]
    fn test_overwrite_writer_rejects_overshoot() {
        let signal = Signal::new();
        signal.append_track(10).unwrap();
        let mut writer = signal.open_writer(InsertMode::Overwrite, 0, 2, 4).unwrap();
        writer.write(&[1, 1]).unwrap();
        let err = writer.write(&[1, 1]).unwrap_err();
        assert!(err.is_range());
        writer.write(&[2]).unwrap();
        drop(writer);
        assert_eq!(signal.read_samples(0, 0, 6).unwrap(), vec![0, 0, 1, 1, 2, 0]);
    }

    #[test]
    fn test_flush_is_idempotent_and_notifies_once() {
        let signal = Signal::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        signal.append_track(0).unwrap();
        signal.set_event_sink(Arc::new(move |e: &SignalEvent| sink.lock().push(e.clone())));

        let observer = Arc::new(AtomicU64::new(0));
        let mut writer = signal
            .open_writer(InsertMode::Append, 0, 0, 0)
            .unwrap()
            .with_length_observer(Arc::clone(&observer));
        writer.write(&[1; 10]).unwrap();
        writer.flush().unwrap();
        writer.flush().unwrap();
        drop(writer);

        assert_eq!(observer.load(Ordering::Relaxed), 10);
        assert_eq!(
            *events.lock(),
            vec![SignalEvent::SamplesInserted { track: 0, range: SampleRange::new(0, 10) }]
        );
    }

    #[test]
    fn test_cancelled_writer_discards() {
        let signal = Signal::new();
        signal.append_track(0).unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut writer = signal
            .open_writer(InsertMode::Append, 0, 0, 0)
            .unwrap()
            .with_cancel_flag(Arc::clone(&cancel));
        writer.write(&[1; 4]).unwrap();
        writer.flush().unwrap();
        cancel.store(true, Ordering::Relaxed);
        assert!(matches!(writer.write(&[2; 4]), Err(SfError::Cancelled)));
        drop(writer);
        assert_eq!(signal.length(), 4);
        assert!(signal.track(0).unwrap().check_invariants());
    }

    #[test]
    fn test_writers_on_different_tracks_are_independent() {
        let signal = Signal::new();
        signal.append_track(0).unwrap();
        signal.append_track(0).unwrap();
        let handles: Vec<_> = (0..2)
            .map(|t| {
                let signal = signal.clone();
                std::thread::spawn(move || {
                    let mut writer = signal.open_writer(InsertMode::Append, t, 0, 0).unwrap();
                    for i in 0..1000 {
                        writer.write_sample(i + t as Sample).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut reader = signal.open_reader(ReaderMode::SinglePassForward, 1, 0, 999).unwrap();
        assert_eq!(reader.read_to_end().unwrap(), (1..1001).collect::<Vec<_>>());
    }
}
