//! Half-open sample ranges

use serde::{Deserialize, Serialize};

use crate::{SfError, SfResult};

/// A run of samples `[offset, offset + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SampleRange {
    pub offset: u64,
    pub length: u64,
}

impl SampleRange {
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Range from an inclusive `[left, right]` pair, empty if `right < left`
    ///
    /// `[0, u64::MAX]` has no representable length and is a range error.
    pub fn inclusive(left: u64, right: u64) -> SfResult<Self> {
        if right < left {
            return Ok(Self::new(left, 0));
        }
        (right - left)
            .checked_add(1)
            .map(|length| Self::new(left, length))
            .ok_or_else(|| SfError::range(format!("inclusive range [{}, {}] is too long", left, right)))
    }

    /// First index after the range
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Last index inside the range (equals `offset` for empty ranges)
    #[inline]
    pub fn last(&self) -> u64 {
        if self.length == 0 {
            self.offset
        } else {
            self.end() - 1
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn contains(&self, pos: u64) -> bool {
        pos >= self.offset && pos < self.end()
    }

    /// True if both ranges share at least one sample
    #[inline]
    pub fn overlaps(&self, other: &SampleRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.offset < other.end() && other.offset < self.end()
    }

    pub fn intersection(&self, other: &SampleRange) -> SampleRange {
        let start = self.offset.max(other.offset);
        let end = self.end().min(other.end());
        if end <= start {
            SampleRange::new(start, 0)
        } else {
            SampleRange::new(start, end - start)
        }
    }

    /// Clamp into `[0, total)`
    pub fn clamped(&self, total: u64) -> SampleRange {
        let offset = self.offset.min(total);
        let length = self.length.min(total - offset);
        SampleRange::new(offset, length)
    }

    /// Fail with a range error unless the range lies inside `[0, total)`
    pub fn check_within(&self, total: u64) -> SfResult<()> {
        if self.offset > total || self.length > total - self.offset {
            return Err(SfError::Range(format!(
                "[{}, {}) exceeds length {}",
                self.offset,
                self.end(),
                total
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusive() {
        let r = SampleRange::inclusive(100, 199).unwrap();
        assert_eq!(r, SampleRange::new(100, 100));
        assert_eq!(r.last(), 199);
        assert!(SampleRange::inclusive(5, 4).unwrap().is_empty());
        assert_eq!(SampleRange::inclusive(1, u64::MAX).unwrap().length, u64::MAX);
    }

    #[test]
    fn test_inclusive_full_axis_is_range_error() {
        assert!(SampleRange::inclusive(0, u64::MAX).unwrap_err().is_range());
    }

    #[test]
    fn test_overlap_rules() {
        let a = SampleRange::new(0, 10);
        let b = SampleRange::new(10, 5);
        let c = SampleRange::new(9, 1);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(!a.overlaps(&SampleRange::new(3, 0)));
        assert_eq!(a.intersection(&c), c);
    }

    #[test]
    fn test_clamp_and_check() {
        let r = SampleRange::new(90, 20);
        assert_eq!(r.clamped(100), SampleRange::new(90, 10));
        assert_eq!(SampleRange::new(200, 5).clamped(100), SampleRange::new(100, 0));
        assert!(r.check_within(100).is_err());
        assert!(r.check_within(110).is_ok());
        assert!(SampleRange::new(100, 0).check_within(100).is_ok());
    }
}
