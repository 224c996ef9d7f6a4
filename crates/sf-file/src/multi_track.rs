//! One reader or writer per track, addressed as a set

use sf_core::{Sample, SfError, SfResult};
use sf_signal::{SampleReader, SampleWriter};

/// Writers filling a group of tracks, index `k` feeding the k-th track
#[derive(Debug, Default)]
pub struct MultiTrackWriter {
    writers: Vec<SampleWriter>,
}

impl MultiTrackWriter {
    pub fn new(writers: Vec<SampleWriter>) -> Self {
        Self { writers }
    }

    pub fn tracks(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    pub fn writer(&mut self, index: usize) -> Option<&mut SampleWriter> {
        self.writers.get_mut(index)
    }

    pub fn push(&mut self, writer: SampleWriter) {
        self.writers.push(writer);
    }

    /// Distribute interleaved frames, one sample per track in turn
    ///
    /// A trailing partial frame is rejected before anything is written.
    pub fn write_interleaved(&mut self, frames: &[Sample]) -> SfResult<()> {
        let n = self.writers.len();
        if n == 0 {
            return Ok(());
        }
        if frames.len() % n != 0 {
            log::warn!("dropping block of {} samples for {} tracks", frames.len(), n);
            return Err(SfError::range(format!(
                "{} samples do not form whole frames of {} tracks",
                frames.len(),
                n
            )));
        }
        let frame_count = frames.len() / n;
        let mut lane = Vec::with_capacity(frame_count);
        for (track, writer) in self.writers.iter_mut().enumerate() {
            lane.clear();
            lane.extend(frames.iter().skip(track).step_by(n).copied());
            writer.write(&lane)?;
        }
        Ok(())
    }

    /// Smallest sample count written to any track
    pub fn written(&self) -> u64 {
        self.writers.iter().map(SampleWriter::written).min().unwrap_or(0)
    }

    pub fn flush(&mut self) -> SfResult<()> {
        for writer in &mut self.writers {
            writer.flush()?;
        }
        Ok(())
    }

    /// Flush and release all track locks
    pub fn finish(mut self) -> SfResult<()> {
        self.flush()
    }

    pub fn into_writers(self) -> Vec<SampleWriter> {
        self.writers
    }
}

/// Readers over a group of tracks, all covering the same range
#[derive(Debug, Default)]
pub struct MultiTrackReader {
    readers: Vec<SampleReader>,
}

impl MultiTrackReader {
    pub fn new(readers: Vec<SampleReader>) -> Self {
        Self { readers }
    }

    pub fn tracks(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    pub fn reader(&mut self, index: usize) -> Option<&mut SampleReader> {
        self.readers.get_mut(index)
    }

    /// Samples per track still to be read
    pub fn remaining(&self) -> u64 {
        self.readers.iter().map(SampleReader::remaining).max().unwrap_or(0)
    }

    pub fn eof(&self) -> bool {
        self.readers.iter().all(SampleReader::eof)
    }

    /// Fill `out` with whole interleaved frames, returning the frame count
    pub fn read_interleaved(&mut self, out: &mut [Sample]) -> SfResult<usize> {
        let n = self.readers.len();
        if n == 0 {
            return Ok(0);
        }
        let wanted = (out.len() / n) as u64;
        let frames = wanted.min(self.remaining()) as usize;
        if frames == 0 {
            return Ok(0);
        }
        let mut lane = vec![0 as Sample; frames];
        for (track, reader) in self.readers.iter_mut().enumerate() {
            lane.fill(0);
            // Shorter ranges read as zero past their end
            let got = reader.read(&mut lane)?;
            lane[got..].fill(0);
            for (frame, sample) in lane.iter().enumerate() {
                out[frame * n + track] = *sample;
            }
        }
        Ok(frames)
    }

    pub fn into_readers(self) -> Vec<SampleReader> {
        self.readers
    }
}
