//! Track: one channel's full sample sequence
//!
//! A track is an ordered, gap-free list of stripes. Every mutating call
//! validates its range and performs all allocations before it changes any
//! stripe, so an error (including OOM) leaves the track as it was. Each
//! call produces exactly one [`TrackChange`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use sf_core::{Sample, SampleRange, SfError, SfResult, TrackId};

use crate::{
    LockMode, RangeLock, RangeLockManager, STRIPE_LENGTH_MAXIMUM, STRIPE_LENGTH_MINIMUM,
    SignalEvent, Stripe,
};

/// Result of one track mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackChange {
    Inserted(SampleRange),
    Deleted(SampleRange),
    Modified(SampleRange),
}

impl TrackChange {
    pub fn range(&self) -> SampleRange {
        match *self {
            TrackChange::Inserted(r) | TrackChange::Deleted(r) | TrackChange::Modified(r) => r,
        }
    }

    /// Event for the track at `index`, `None` for no-op changes
    pub fn into_event(self, index: usize) -> Option<SignalEvent> {
        if self.range().is_empty() {
            return None;
        }
        Some(match self {
            TrackChange::Inserted(range) => SignalEvent::SamplesInserted { track: index, range },
            TrackChange::Deleted(range) => SignalEvent::SamplesDeleted { track: index, range },
            TrackChange::Modified(range) => SignalEvent::SamplesModified { track: index, range },
        })
    }
}

/// Deep copy of a track's content and identity
#[derive(Debug, Clone)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub selected: bool,
    pub stripes: Vec<Vec<Sample>>,
}

impl TrackSnapshot {
    pub fn length(&self) -> u64 {
        self.stripes.iter().map(|s| s.len() as u64).sum()
    }

    pub fn memory(&self) -> usize {
        self.stripes.iter().map(|s| s.len()).sum::<usize>() * sf_core::SAMPLE_STORAGE_BYTES
    }
}

/// Source of samples for an insertion
#[derive(Clone, Copy)]
enum Fill<'a> {
    Data(&'a [Sample]),
    Silence(u64),
}

impl Fill<'_> {
    fn len(&self) -> u64 {
        match self {
            Fill::Data(d) => d.len() as u64,
            Fill::Silence(n) => *n,
        }
    }

    fn chunk(&self, from: usize, len: usize) -> SfResult<Vec<Sample>> {
        match self {
            Fill::Data(d) => {
                let mut v = Vec::new();
                v.try_reserve_exact(len)?;
                v.extend_from_slice(&d[from..from + len]);
                Ok(v)
            }
            Fill::Silence(_) => sf_core::try_alloc_samples(len),
        }
    }
}

/// One channel of sample data
#[derive(Debug)]
pub struct Track {
    id: TrackId,
    stripes: RwLock<Vec<Stripe>>,
    selected: AtomicBool,
    locks: Arc<RangeLockManager>,
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

impl Track {
    /// Empty, selected track with a fresh id
    pub fn new() -> Self {
        Self::with_id(TrackId::generate())
    }

    pub fn with_id(id: TrackId) -> Self {
        Self {
            id,
            stripes: RwLock::new(Vec::new()),
            selected: AtomicBool::new(true),
            locks: Arc::new(RangeLockManager::new()),
        }
    }

    /// Track of `length` zero samples
    pub fn with_length(length: u64) -> SfResult<Self> {
        let track = Self::new();
        if length > 0 {
            track.append_stripe(length)?;
        }
        Ok(track)
    }

    /// Rebuild a track from a snapshot, keeping its identity
    pub fn from_snapshot(snapshot: TrackSnapshot) -> Self {
        let track = Self::with_id(snapshot.id);
        track.selected.store(snapshot.selected, Ordering::Relaxed);
        {
            let mut stripes = track.stripes.write();
            let mut start = 0;
            for samples in snapshot.stripes.into_iter().filter(|s| !s.is_empty()) {
                let stripe = Stripe::from_samples(start, samples);
                start = stripe.end();
                stripes.push(stripe);
            }
        }
        track
    }

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn length(&self) -> u64 {
        self.stripes.read().last().map(|s| s.end()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    pub fn selected(&self) -> bool {
        self.selected.load(Ordering::Relaxed)
    }

    /// Returns true if the flag actually changed
    pub fn set_selected(&self, selected: bool) -> bool {
        self.selected.swap(selected, Ordering::Relaxed) != selected
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.read().len()
    }

    /// Position and length of every stripe, in order
    pub fn stripe_layout(&self) -> Vec<SampleRange> {
        self.stripes.read().iter().map(|s| s.range()).collect()
    }

    /// Ordered, non-overlapping, gap-free from 0, no empty stripes
    pub fn check_invariants(&self) -> bool {
        let stripes = self.stripes.read();
        let mut expected = 0;
        for stripe in stripes.iter() {
            if stripe.is_empty() || stripe.start() != expected {
                return false;
            }
            expected = stripe.end();
        }
        true
    }

    pub fn lock_range(&self, mode: LockMode, range: SampleRange) -> RangeLock {
        self.locks.lock(mode, range)
    }

    pub fn range_locks(&self) -> &Arc<RangeLockManager> {
        &self.locks
    }

    /// Append a stripe of `length` zero samples after the last one
    ///
    /// Lengths above [`STRIPE_LENGTH_MAXIMUM`] produce several stripes.
    pub fn append_stripe(&self, length: u64) -> SfResult<SampleRange> {
        let mut stripes = self.stripes.write();
        let start = stripes.last().map(|s| s.end()).unwrap_or(0);
        let new = build_stripes(start, Fill::Silence(length))?;
        stripes.try_reserve(new.len())?;
        stripes.extend(new);
        Ok(SampleRange::new(start, length))
    }

    /// Copy `count` samples starting at `offset`
    pub fn read(&self, offset: u64, count: u64) -> SfResult<Vec<Sample>> {
        SampleRange::new(offset, count).check_within(self.length())?;
        let mut out = sf_core::try_alloc_samples(count as usize)?;
        self.read_into(offset, &mut out)?;
        Ok(out)
    }

    pub fn read_into(&self, offset: u64, out: &mut [Sample]) -> SfResult<()> {
        let stripes = self.stripes.read();
        let total = stripes.last().map(|s| s.end()).unwrap_or(0);
        let range = SampleRange::new(offset, out.len() as u64);
        range.check_within(total)?;

        let mut done = 0usize;
        for stripe in stripes.iter().skip(find_stripe(&stripes, offset)) {
            if done == out.len() {
                break;
            }
            let part = stripe.range().intersection(&range);
            if part.is_empty() {
                continue;
            }
            let local = (part.offset - stripe.start()) as usize;
            let n = part.length as usize;
            stripe.read_into(local, &mut out[done..done + n])?;
            done += n;
        }
        Ok(())
    }

    /// Append samples after the current end
    pub fn append(&self, samples: &[Sample]) -> SfResult<TrackChange> {
        let mut stripes = self.stripes.write();
        let end = stripes.last().map(|s| s.end()).unwrap_or(0);
        insert_fill(&mut stripes, end, Fill::Data(samples))?;
        Ok(TrackChange::Inserted(SampleRange::new(end, samples.len() as u64)))
    }

    /// Insert samples before `offset`, shifting everything behind it
    pub fn insert(&self, offset: u64, samples: &[Sample]) -> SfResult<TrackChange> {
        let mut stripes = self.stripes.write();
        insert_fill(&mut stripes, offset, Fill::Data(samples))?;
        Ok(TrackChange::Inserted(SampleRange::new(offset, samples.len() as u64)))
    }

    /// Open a gap of `length` zero samples at `offset`
    pub fn insert_space(&self, offset: u64, length: u64) -> SfResult<TrackChange> {
        let mut stripes = self.stripes.write();
        insert_fill(&mut stripes, offset, Fill::Silence(length))?;
        Ok(TrackChange::Inserted(SampleRange::new(offset, length)))
    }

    /// Replace samples in place; the range must lie inside the track
    pub fn overwrite(&self, offset: u64, samples: &[Sample]) -> SfResult<TrackChange> {
        let mut stripes = self.stripes.write();
        let total = stripes.last().map(|s| s.end()).unwrap_or(0);
        let range = SampleRange::new(offset, samples.len() as u64);
        range.check_within(total)?;

        let first = find_stripe(&stripes, offset);
        let mut done = 0usize;
        for stripe in stripes.iter_mut().skip(first) {
            if done == samples.len() {
                break;
            }
            let part = stripe.range().intersection(&range);
            if part.is_empty() {
                continue;
            }
            let local = (part.offset - stripe.start()) as usize;
            let n = part.length as usize;
            stripe.overwrite(local, &samples[done..done + n])?;
            done += n;
        }
        Ok(TrackChange::Modified(range))
    }

    /// Remove `[offset, offset + length)` and close the gap
    pub fn delete_range(&self, offset: u64, length: u64) -> SfResult<TrackChange> {
        let range = SampleRange::new(offset, length);
        let mut stripes = self.stripes.write();
        let total = stripes.last().map(|s| s.end()).unwrap_or(0);
        range.check_within(total)?;
        if length == 0 {
            return Ok(TrackChange::Deleted(range));
        }

        let first = find_stripe(&stripes, offset);
        for stripe in stripes.iter_mut().skip(first) {
            let part = stripe.range().intersection(&range);
            if part.is_empty() {
                if stripe.start() >= range.end() {
                    break;
                }
                continue;
            }
            let local = (part.offset - stripe.start()) as usize;
            stripe.delete(local, part.length as usize)?;
        }

        stripes.retain(|s| !s.is_empty());
        renumber(&mut stripes);
        let joint = find_stripe(&stripes, offset);
        defragment(&mut stripes, joint);
        Ok(TrackChange::Deleted(range))
    }

    /// Deep copy of content, id and selection flag
    pub fn snapshot(&self) -> SfResult<TrackSnapshot> {
        let stripes = self.stripes.read();
        let mut copies = Vec::new();
        copies.try_reserve_exact(stripes.len())?;
        for stripe in stripes.iter() {
            let mut copy = Vec::new();
            copy.try_reserve_exact(stripe.samples().len())?;
            copy.extend_from_slice(stripe.samples());
            copies.push(copy);
        }
        Ok(TrackSnapshot {
            id: self.id,
            selected: self.selected(),
            stripes: copies,
        })
    }

    /// Consume the track, handing out its stripes without copying
    pub fn into_snapshot(self) -> TrackSnapshot {
        let selected = self.selected();
        TrackSnapshot {
            id: self.id,
            selected,
            stripes: self
                .stripes
                .into_inner()
                .into_iter()
                .map(Stripe::into_samples)
                .collect(),
        }
    }
}

/// Index of the stripe containing `offset`, or the stripe count if
/// `offset` is at or behind the end
fn find_stripe(stripes: &[Stripe], offset: u64) -> usize {
    stripes.partition_point(|s| s.end() <= offset)
}

fn renumber(stripes: &mut [Stripe]) {
    let mut start = 0;
    for stripe in stripes.iter_mut() {
        stripe.set_start(start);
        start = stripe.end();
    }
}

/// Cut a fill into stripes of at most [`STRIPE_LENGTH_MAXIMUM`] samples
fn build_stripes(start: u64, fill: Fill<'_>) -> SfResult<Vec<Stripe>> {
    let total = fill.len() as usize;
    let mut result = Vec::new();
    result.try_reserve(total.div_ceil(STRIPE_LENGTH_MAXIMUM))?;
    let mut done = 0usize;
    while done < total {
        let n = (total - done).min(STRIPE_LENGTH_MAXIMUM);
        result.push(Stripe::from_samples(start + done as u64, fill.chunk(done, n)?));
        done += n;
    }
    Ok(result)
}

fn insert_fill(stripes: &mut Vec<Stripe>, offset: u64, fill: Fill<'_>) -> SfResult<()> {
    let total = stripes.last().map(|s| s.end()).unwrap_or(0);
    if offset > total {
        return Err(SfError::Range(format!(
            "insert position {} behind track end {}",
            offset, total
        )));
    }
    let count = fill.len();
    if count == 0 {
        return Ok(());
    }

    // the stripe receiving the samples: the one containing offset, or the
    // last one when appending
    let index = find_stripe(stripes, offset);
    let target = if index < stripes.len() {
        Some(index)
    } else {
        stripes.len().checked_sub(1)
    };

    if let Some(i) = target {
        let stripe = &mut stripes[i];
        if stripe.length() + count <= STRIPE_LENGTH_MAXIMUM as u64 {
            let local = (offset - stripe.start()) as usize;
            match fill {
                Fill::Data(d) => stripe.insert(local, d)?,
                Fill::Silence(n) => stripe.insert_silence(local, n as usize)?,
            }
            renumber(&mut stripes[i..]);
            return Ok(());
        }
    }

    // does not fit: build the new stripes and the split tail first, commit
    // only when every allocation succeeded
    let new = build_stripes(offset, fill)?;
    let split = match target {
        Some(i) if offset > stripes[i].start() && offset < stripes[i].end() => {
            let local = (offset - stripes[i].start()) as usize;
            let tail = Stripe::from_slice(offset, &stripes[i].samples()[local..])?;
            Some((i, local, tail))
        }
        _ => None,
    };
    stripes.try_reserve(new.len() + 1)?;

    let insert_at = match split {
        Some((i, local, tail)) => {
            // cannot fail: local is inside the stripe and truncation does not allocate
            let head_len = stripes[i].length() as usize;
            stripes[i].delete(local, head_len - local)?;
            stripes.insert(i + 1, tail);
            i + 1
        }
        None => index,
    };
    let new_len = new.len();
    stripes.splice(insert_at..insert_at, new);
    renumber(stripes);
    defragment(stripes, insert_at + new_len);
    defragment(stripes, insert_at);
    Ok(())
}

/// Merge the stripe at `index` with its predecessor if one of them is
/// below the minimum length and the result fits into one stripe
fn defragment(stripes: &mut Vec<Stripe>, index: usize) {
    if index == 0 || index >= stripes.len() {
        return;
    }
    let (left, right) = (stripes[index - 1].length(), stripes[index].length());
    let small = left < STRIPE_LENGTH_MINIMUM as u64 || right < STRIPE_LENGTH_MINIMUM as u64;
    if !small || left + right > STRIPE_LENGTH_MAXIMUM as u64 {
        return;
    }
    let next = stripes.remove(index);
    if let Err(err) = stripes[index - 1].append(next.samples()) {
        // not fatal, the layout stays valid without the merge
        log::debug!("stripe merge skipped: {}", err);
        stripes.insert(index, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(n: usize, seed: Sample) -> Vec<Sample> {
        (0..n as Sample).map(|i| (i * 7 + seed) % 1000).collect()
    }

    fn two_stripe_track(half: u64) -> Track {
        let track = Track::new();
        track.append_stripe(half).unwrap();
        track.append_stripe(half).unwrap();
        track
    }

    #[test]
    fn test_append_stripe_layout() {
        let track = two_stripe_track(32768);
        assert_eq!(track.length(), 65536);
        assert_eq!(
            track.stripe_layout(),
            vec![SampleRange::new(0, 32768), SampleRange::new(32768, 32768)]
        );
        assert!(track.check_invariants());
    }

    #[test]
    fn test_delete_range_cases() {
        for (track_len, offset, delete_len, expected) in [
            (16384u64, 0u64, 16384u64, 0u64),
            (32768, 0, 32768, 0),
            (65536, 0, 16384, 49152),
            (65536, 16384, 16384, 49152),
        ] {
            let track = if track_len == 65536 {
                two_stripe_track(32768)
            } else {
                Track::with_length(track_len).unwrap()
            };
            track.delete_range(offset, delete_len).unwrap();
            assert_eq!(track.length(), expected, "len {} off {}", track_len, offset);
            assert!(track.check_invariants());
        }
    }

    #[test]
    fn test_delete_inside_first_stripe_keeps_second() {
        let track = two_stripe_track(32768);
        track.delete_range(16384, 16384).unwrap();
        assert_eq!(
            track.stripe_layout(),
            vec![SampleRange::new(0, 16384), SampleRange::new(16384, 32768)]
        );
    }

    #[test]
    fn test_delete_across_boundary() {
        let track = two_stripe_track(10000);
        track.overwrite(0, &pattern(20000, 0)).unwrap();
        assert_eq!(track.stripe_count(), 2);
        let data = track.read(0, 20000).unwrap();
        track.delete_range(1000, 18000).unwrap();
        let mut expected = data[..1000].to_vec();
        expected.extend_from_slice(&data[19000..]);
        assert_eq!(track.read(0, 2000).unwrap(), expected);
        assert_eq!(track.stripe_count(), 1);
    }

    #[test]
    fn test_delete_out_of_range_is_rejected() {
        let track = Track::with_length(100).unwrap();
        let err = track.delete_range(50, 51).unwrap_err();
        assert!(err.is_range());
        assert_eq!(track.length(), 100);
    }

    #[test]
    fn test_oversized_read_is_range_error() {
        let track = Track::with_length(100).unwrap();
        assert!(track.read(90, u64::MAX / 2).unwrap_err().is_range());
        assert!(track.read(101, 0).unwrap_err().is_range());
        assert!(track.read(100, 0).unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_read_back() {
        let track = Track::new();
        track.append(&[1, 2, 3, 4]).unwrap();
        track.insert(2, &[9, 9]).unwrap();
        assert_eq!(track.read(0, 6).unwrap(), vec![1, 2, 9, 9, 3, 4]);
        track.insert(6, &[5]).unwrap();
        assert_eq!(track.length(), 7);
        assert!(track.insert(9, &[1]).is_err());
    }

    #[test]
    fn test_large_insert_splits_stripe() {
        let track = Track::new();
        track.append(&pattern(1000, 3)).unwrap();
        let big = pattern(STRIPE_LENGTH_MAXIMUM + 10, 5);
        track.insert(500, &big).unwrap();
        assert_eq!(track.length(), 1000 + big.len() as u64);
        assert!(track.check_invariants());
        assert_eq!(track.read(500, 10).unwrap(), big[..10].to_vec());
        assert_eq!(track.read(500 + big.len() as u64, 500).unwrap(), pattern(1000, 3)[500..].to_vec());
    }

    #[test]
    fn test_insert_space_then_delete_restores() {
        let track = Track::new();
        let data = pattern(5000, 1);
        track.append(&data).unwrap();
        track.insert_space(2500, 300).unwrap();
        assert_eq!(track.read(2500, 300).unwrap(), vec![0; 300]);
        track.delete_range(2500, 300).unwrap();
        assert_eq!(track.read(0, 5000).unwrap(), data);
    }

    #[test]
    fn test_overwrite_spanning_stripes() {
        let track = two_stripe_track(100);
        let change = track.overwrite(90, &[7; 20]).unwrap();
        assert_eq!(change, TrackChange::Modified(SampleRange::new(90, 20)));
        assert_eq!(track.read(88, 24).unwrap()[2..22], [7; 20]);
        assert!(track.overwrite(190, &[1; 11]).is_err());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let track = Track::new();
        track.append(&pattern(300, 2)).unwrap();
        track.set_selected(false);
        let snap = track.snapshot().unwrap();
        assert_eq!(snap.length(), 300);
        let copy = Track::from_snapshot(snap);
        assert_eq!(copy.id(), track.id());
        assert!(!copy.selected());
        assert_eq!(copy.read(0, 300).unwrap(), track.read(0, 300).unwrap());
    }

    #[test]
    fn test_change_into_event() {
        assert!(TrackChange::Deleted(SampleRange::new(5, 0)).into_event(0).is_none());
        assert_eq!(
            TrackChange::Inserted(SampleRange::new(1, 2)).into_event(3),
            Some(SignalEvent::SamplesInserted { track: 3, range: SampleRange::new(1, 2) })
        );
    }
}
