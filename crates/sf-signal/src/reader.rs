//! Sequential sample reader over one track range

use std::sync::Arc;

use sf_core::{Sample, SampleRange, SfError, SfResult, TrackId};

use crate::{LockMode, RangeLock, Track};

/// Samples fetched from the track per refill
const READER_BUFFER_SAMPLES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMode {
    /// Forward only, no seeking
    SinglePassForward,
    /// Seeking inside `[first, last]` allowed
    RandomAccess,
}

/// Pull access to a range of one track
///
/// Holds a shared range lock for its lifetime. Positions behind the end of
/// the track read as silence, so tracks of unequal length can be read as
/// one block. Not meant to be shared between threads.
#[derive(Debug)]
pub struct SampleReader {
    track: Arc<Track>,
    mode: ReaderMode,
    range: SampleRange,
    position: u64,
    buffer: Vec<Sample>,
    buffer_pos: usize,
    _lock: RangeLock,
}

impl SampleReader {
    pub(crate) fn new(track: Arc<Track>, mode: ReaderMode, range: SampleRange) -> SfResult<Self> {
        if range.offset.checked_add(range.length).is_none() {
            return Err(SfError::Range(format!(
                "reader range at {} of {} samples passes the end of the sample axis",
                range.offset, range.length
            )));
        }
        let lock = track.lock_range(LockMode::Shared, range);
        Ok(Self {
            track,
            mode,
            range,
            position: range.offset,
            buffer: Vec::new(),
            buffer_pos: 0,
            _lock: lock,
        })
    }

    pub fn track_id(&self) -> TrackId {
        self.track.id()
    }

    pub fn mode(&self) -> ReaderMode {
        self.mode
    }

    pub fn first(&self) -> u64 {
        self.range.offset
    }

    /// Last sample of the range, equal to `first()` for an empty reader
    pub fn last(&self) -> u64 {
        self.range.last()
    }

    pub fn range(&self) -> SampleRange {
        self.range
    }

    /// Position of the next sample handed out
    pub fn position(&self) -> u64 {
        self.position - (self.buffer.len() - self.buffer_pos) as u64
    }

    pub fn remaining(&self) -> u64 {
        self.range.end().saturating_sub(self.position())
    }

    pub fn eof(&self) -> bool {
        self.remaining() == 0
    }

    /// Move to an absolute position, only in [`ReaderMode::RandomAccess`]
    pub fn seek(&mut self, pos: u64) -> SfResult<()> {
        if self.mode != ReaderMode::RandomAccess {
            return Err(SfError::State("seek on a single pass reader".into()));
        }
        if pos < self.range.offset || pos > self.range.end() {
            return Err(SfError::Range(format!(
                "seek to {} outside [{}, {})",
                pos,
                self.range.offset,
                self.range.end()
            )));
        }
        self.buffer.clear();
        self.buffer_pos = 0;
        self.position = pos;
        Ok(())
    }

    /// Fill `out` from the current position, returns the number of samples
    /// delivered (less than `out.len()` only at the end of the range)
    pub fn read(&mut self, out: &mut [Sample]) -> SfResult<usize> {
        let mut done = 0;

        // buffered samples first
        let buffered = (self.buffer.len() - self.buffer_pos).min(out.len());
        if buffered > 0 {
            out[..buffered].copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + buffered]);
            self.buffer_pos += buffered;
            done = buffered;
        }

        let want = ((out.len() - done) as u64).min(self.unbuffered_remaining()) as usize;
        if want > 0 {
            self.fetch(self.position, &mut out[done..done + want])?;
            self.position += want as u64;
            done += want;
        }
        Ok(done)
    }

    /// Read the rest of the range into a new buffer
    pub fn read_to_end(&mut self) -> SfResult<Vec<Sample>> {
        let mut out = sf_core::try_alloc_samples(self.remaining() as usize)?;
        let n = self.read(&mut out)?;
        out.truncate(n);
        Ok(out)
    }

    /// Next single sample, `None` at the end of the range
    pub fn next_sample(&mut self) -> SfResult<Option<Sample>> {
        if self.buffer_pos >= self.buffer.len() {
            let n = (self.unbuffered_remaining() as usize).min(READER_BUFFER_SAMPLES);
            if n == 0 {
                return Ok(None);
            }
            let mut buffer = std::mem::take(&mut self.buffer);
            buffer.clear();
            buffer.resize(n, 0);
            self.fetch(self.position, &mut buffer)?;
            self.position += n as u64;
            self.buffer = buffer;
            self.buffer_pos = 0;
        }
        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Ok(Some(sample))
    }

    fn unbuffered_remaining(&self) -> u64 {
        self.range.end().saturating_sub(self.position)
    }

    /// Copy from the track, zero padding behind its end
    fn fetch(&self, pos: u64, out: &mut [Sample]) -> SfResult<()> {
        let length = self.track.length();
        let available = length.saturating_sub(pos).min(out.len() as u64) as usize;
        if available > 0 {
            self.track.read_into(pos, &mut out[..available])?;
        }
        out[available..].fill(0);
        Ok(())
    }
}

impl Iterator for SampleReader {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        match self.next_sample() {
            Ok(sample) => sample,
            Err(err) => {
                log::warn!("sample reader on {}: {}", self.track.id(), err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Signal;

    fn signal_with(data: &[Sample]) -> Signal {
        let signal = Signal::new();
        signal.append_track(0).unwrap();
        signal.append_samples(0, data).unwrap();
        signal
    }

    #[test]
    fn test_read_range() {
        let data: Vec<Sample> = (0..100).collect();
        let signal = signal_with(&data);
        let mut reader = signal.open_reader(ReaderMode::SinglePassForward, 0, 10, 19).unwrap();
        let mut out = [0; 32];
        assert_eq!(reader.read(&mut out).unwrap(), 10);
        assert_eq!(out[..10], data[10..20]);
        assert!(reader.eof());
    }

    #[test]
    fn test_zero_padding_behind_end() {
        let signal = signal_with(&[5, 6, 7]);
        let mut reader = signal.open_reader(ReaderMode::SinglePassForward, 0, 1, 5).unwrap();
        assert_eq!(reader.read_to_end().unwrap(), vec![6, 7, 0, 0, 0]);
    }

    #[test]
    fn test_iterator_and_seek() {
        let data: Vec<Sample> = (0..50).collect();
        let signal = signal_with(&data);
        let mut reader = signal.open_reader(ReaderMode::RandomAccess, 0, 0, 49).unwrap();
        let head: Vec<Sample> = reader.by_ref().take(5).collect();
        assert_eq!(head, vec![0, 1, 2, 3, 4]);
        assert_eq!(reader.position(), 5);
        reader.seek(40).unwrap();
        let tail: Vec<Sample> = reader.collect();
        assert_eq!(tail, (40..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_range_at_start() {
        let signal = signal_with(&[1, 2, 3]);
        let mut reader = signal
            .open_range_reader(ReaderMode::SinglePassForward, 0, SampleRange::new(0, 0))
            .unwrap();
        assert!(reader.eof());
        assert_eq!(reader.remaining(), 0);
        assert!(reader.read_to_end().unwrap().is_empty());
    }

    #[test]
    fn test_full_axis_range_is_rejected() {
        let signal = signal_with(&[1, 2, 3]);
        let err = signal.open_reader(ReaderMode::SinglePassForward, 0, 0, u64::MAX).unwrap_err();
        assert!(err.is_range());
        let err = signal
            .open_range_reader(ReaderMode::SinglePassForward, 0, SampleRange::new(5, u64::MAX))
            .unwrap_err();
        assert!(err.is_range());
    }

    #[test]
    fn test_single_pass_cannot_seek() {
        let signal = signal_with(&[1, 2, 3]);
        let mut reader = signal.open_reader(ReaderMode::SinglePassForward, 0, 0, 2).unwrap();
        assert!(reader.seek(0).is_err());
    }

    #[test]
    fn test_reader_blocks_exclusive_edit_of_same_range() {
        let signal = signal_with(&[1, 2, 3, 4]);
        let reader = signal.open_reader(ReaderMode::SinglePassForward, 0, 0, 3).unwrap();
        let track = signal.track(0).unwrap();
        assert!(
            track
                .range_locks()
                .try_lock(LockMode::Exclusive, SampleRange::new(2, 1))
                .is_none()
        );
        drop(reader);
        assert!(
            track
                .range_locks()
                .try_lock(LockMode::Exclusive, SampleRange::new(2, 1))
                .is_some()
        );
    }
}
