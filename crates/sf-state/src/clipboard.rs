//! Multi-track clipboard
//!
//! Holds one sample buffer per copied track. Pasting maps clipboard track
//! `k % n` onto the k-th selected track, so a mono clip fills every
//! selected track and a stereo clip alternates.

use parking_lot::Mutex;
use sf_core::{Sample, SfResult};
use sf_signal::ReaderMode;

use crate::SignalManager;

#[derive(Debug, Default)]
struct ClipContent {
    tracks: Vec<Vec<Sample>>,
    rate: f64,
}

#[derive(Debug, Default)]
pub struct ClipBoard {
    content: Mutex<ClipContent>,
}

impl ClipBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.content.lock().tracks.iter().all(Vec::is_empty)
    }

    /// Number of stored tracks
    pub fn tracks(&self) -> usize {
        self.content.lock().tracks.len()
    }

    /// Samples per track
    pub fn length(&self) -> u64 {
        self.content
            .lock()
            .tracks
            .iter()
            .map(|t| t.len() as u64)
            .max()
            .unwrap_or(0)
    }

    /// Sample rate of the document the content was copied from
    pub fn rate(&self) -> f64 {
        self.content.lock().rate
    }

    pub fn set(&self, tracks: Vec<Vec<Sample>>, rate: f64) {
        *self.content.lock() = ClipContent { tracks, rate };
    }

    pub fn track(&self, index: usize) -> Option<Vec<Sample>> {
        self.content.lock().tracks.get(index).cloned()
    }

    pub fn clear(&self) {
        *self.content.lock() = ClipContent::default();
    }
}

impl SignalManager {
    /// Copy the selected range of the selected tracks
    ///
    /// Returns false, leaving the clipboard alone, when nothing is selected.
    pub fn copy(&self) -> SfResult<bool> {
        let selection = self.selection();
        let tracks = self.selected_tracks();
        if selection.is_empty() || tracks.is_empty() {
            return Ok(false);
        }
        let mut data = Vec::with_capacity(tracks.len());
        for index in tracks {
            let mut reader =
                self.open_reader(ReaderMode::SinglePassForward, index, selection.first(), selection.last())?;
            data.push(reader.read_to_end()?);
        }
        log::debug!("copied {} tracks x {} samples", data.len(), selection.length);
        self.clipboard().set(data, self.status().rate);
        Ok(true)
    }

    pub fn cut(&self) -> SfResult<bool> {
        self.with_transaction("Cut", |m| {
            if !m.copy()? {
                return Ok(false);
            }
            m.delete_selection_in()?;
            Ok(true)
        })
    }

    /// Delete the selected range, leaving the cursor at its start
    pub fn delete_selection(&self) -> SfResult<bool> {
        self.with_transaction("Delete", |m| m.delete_selection_in())
    }

    fn delete_selection_in(&self) -> SfResult<bool> {
        let selection = self.selection();
        let tracks = self.selected_tracks();
        if selection.is_empty() || tracks.is_empty() {
            return Ok(false);
        }
        self.delete_range_in(selection.offset, selection.length, &tracks)?;
        self.select_range(selection.offset, 0);
        Ok(true)
    }

    /// Keep only the selected range of the selected tracks
    pub fn crop(&self) -> SfResult<bool> {
        self.with_transaction("Crop", |m| {
            let selection = m.selection();
            let tracks = m.selected_tracks();
            if selection.is_empty() || tracks.is_empty() {
                return Ok(false);
            }
            let end = selection.range().end();
            let length = m.length();
            if end < length {
                m.delete_range_in(end, length - end, &tracks)?;
            }
            m.delete_range_in(0, selection.offset, &tracks)?;
            m.select_range(0, selection.length);
            Ok(true)
        })
    }

    /// Replace the selection with the clipboard content
    ///
    /// The pasted range becomes the new selection.
    pub fn paste(&self) -> SfResult<bool> {
        self.with_transaction("Paste", |m| {
            let clip_tracks = m.clipboard().tracks();
            let tracks = m.selected_tracks();
            if m.clipboard().is_empty() || tracks.is_empty() {
                return Ok(false);
            }
            let selection = m.selection();
            if !selection.is_empty() {
                m.delete_range_in(selection.offset, selection.length, &tracks)?;
            }

            let offset = selection.offset;
            for (k, &index) in tracks.iter().enumerate() {
                let Some(samples) = m.clipboard().track(k % clip_tracks) else {
                    continue;
                };
                let length = m.signal().track(index).map(|t| t.length()).unwrap_or(0);
                if length < offset {
                    m.insert_space_in(length, offset - length, &[index])?;
                }
                m.insert_samples_in(index, offset, &samples)?;
            }
            m.select_range(offset, m.clipboard().length());
            log::debug!("pasted {} samples at {}", m.clipboard().length(), offset);
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Selection;

    fn manager(tracks: usize, length: u64) -> SignalManager {
        let m = SignalManager::new();
        m.new_signal(length, 44100.0, 16, tracks).unwrap();
        for t in 0..tracks {
            let pattern: Vec<Sample> = (0..length as Sample).map(|i| i + 1000 * t as Sample).collect();
            m.signal().overwrite_samples(t, 0, &pattern).unwrap();
        }
        m.flush_undo_buffers();
        m
    }

    #[test]
    fn test_copy_requires_selection() {
        let m = manager(1, 100);
        assert!(!m.copy().unwrap());
        assert!(m.clipboard().is_empty());
    }

    #[test]
    fn test_copy_paste_replaces_selection() {
        let m = manager(2, 100);
        m.select_range(10, 5);
        assert!(m.copy().unwrap());
        assert_eq!(m.clipboard().tracks(), 2);
        assert_eq!(m.clipboard().length(), 5);
        assert_eq!(m.clipboard().rate(), 44100.0);

        m.select_range(50, 10);
        assert!(m.paste().unwrap());
        assert_eq!(m.length(), 95);
        assert_eq!(m.selection(), Selection::new(50, 5));
        assert_eq!(m.signal().read_samples(0, 50, 5).unwrap(), vec![10, 11, 12, 13, 14]);
        assert_eq!(
            m.signal().read_samples(1, 50, 5).unwrap(),
            vec![1010, 1011, 1012, 1013, 1014]
        );

        m.undo().unwrap();
        assert_eq!(m.length(), 100);
        assert_eq!(m.selection(), Selection::new(50, 10));
        assert_eq!(m.signal().read_samples(0, 50, 1).unwrap(), vec![50]);
    }

    #[test]
    fn test_mono_clip_fills_every_selected_track() {
        let m = manager(2, 20);
        m.clipboard().set(vec![vec![-1, -2, -3]], 44100.0);
        m.select_range(4, 0);
        assert!(m.paste().unwrap());
        for t in 0..2 {
            assert_eq!(m.signal().read_samples(t, 4, 3).unwrap(), vec![-1, -2, -3]);
        }
        assert_eq!(m.length(), 23);
    }

    #[test]
    fn test_cut_and_crop() {
        let m = manager(1, 100);
        m.select_range(0, 10);
        assert!(m.cut().unwrap());
        assert_eq!(m.length(), 90);
        assert_eq!(m.selection(), Selection::new(0, 0));
        assert_eq!(m.clipboard().length(), 10);
        assert_eq!(m.undo_description().as_deref(), Some("Cut"));

        m.select_range(20, 30);
        assert!(m.crop().unwrap());
        assert_eq!(m.length(), 30);
        assert_eq!(m.selection(), Selection::new(0, 30));
        assert_eq!(m.signal().read_samples(0, 0, 1).unwrap(), vec![30]);

        m.undo().unwrap();
        assert_eq!(m.length(), 90);
        m.undo().unwrap();
        assert_eq!(m.length(), 100);
        assert_eq!(m.signal().read_samples(0, 0, 1).unwrap(), vec![0]);
    }

    #[test]
    fn test_paste_only_into_selected_tracks() {
        let m = manager(2, 10);
        m.clipboard().set(vec![vec![5; 4]], 44100.0);
        m.select_track(1, crate::TrackSelect::Off).unwrap();
        m.select_range(0, 0);
        m.paste().unwrap();
        assert_eq!(m.signal().track(0).unwrap().length(), 14);
        assert_eq!(m.signal().track(1).unwrap().length(), 10);
    }
}
