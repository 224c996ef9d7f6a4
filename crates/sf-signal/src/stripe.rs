//! Stripe: one contiguous run of samples inside a track

use sf_core::{Sample, SampleRange, SfError, SfResult};

/// Upper bound for the number of samples in a single stripe
pub const STRIPE_LENGTH_MAXIMUM: usize = 1 << 18;

/// Stripes shorter than this are merged with a neighbour when possible
pub const STRIPE_LENGTH_MINIMUM: usize = 1 << 12;

/// Contiguous block of samples starting at `start` in the track's
/// address space
///
/// All operations are bounds checked and allocate before touching the
/// sample buffer, so a failed call leaves the stripe unchanged.
#[derive(Debug, Clone, Default)]
pub struct Stripe {
    start: u64,
    samples: Vec<Sample>,
}

impl Stripe {
    pub fn new(start: u64) -> Self {
        Self {
            start,
            samples: Vec::new(),
        }
    }

    /// Stripe of `length` zero samples
    pub fn with_length(start: u64, length: usize) -> SfResult<Self> {
        Ok(Self {
            start,
            samples: sf_core::try_alloc_samples(length)?,
        })
    }

    pub fn from_samples(start: u64, samples: Vec<Sample>) -> Self {
        Self { start, samples }
    }

    /// Copy of a slice into a fresh stripe
    pub fn from_slice(start: u64, samples: &[Sample]) -> SfResult<Self> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(samples.len())?;
        buffer.extend_from_slice(samples);
        Ok(Self::from_samples(start, buffer))
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.samples.len() as u64
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.start + self.length()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn range(&self) -> SampleRange {
        SampleRange::new(self.start, self.length())
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub(crate) fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    pub(crate) fn set_start(&mut self, start: u64) {
        self.start = start;
    }

    /// Bytes held by this stripe's buffer
    pub fn memory(&self) -> usize {
        self.samples.len() * sf_core::SAMPLE_STORAGE_BYTES
    }

    fn check(&self, offset: usize, count: usize, what: &str) -> SfResult<()> {
        if offset > self.samples.len() || count > self.samples.len() - offset {
            return Err(SfError::Range(format!(
                "stripe {}: {} [{}, {}) outside of [0, {})",
                self.start,
                what,
                offset,
                offset.saturating_add(count),
                self.samples.len()
            )));
        }
        Ok(())
    }

    /// Append samples at the end of the stripe
    pub fn append(&mut self, samples: &[Sample]) -> SfResult<()> {
        self.samples.try_reserve(samples.len())?;
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    /// Append `count` zero samples
    pub fn append_silence(&mut self, count: usize) -> SfResult<()> {
        self.samples.try_reserve(count)?;
        self.samples.resize(self.samples.len() + count, 0);
        Ok(())
    }

    /// Insert samples before the stripe-local `offset`
    pub fn insert(&mut self, offset: usize, samples: &[Sample]) -> SfResult<()> {
        self.check(offset, 0, "insert at")?;
        self.samples.try_reserve(samples.len())?;
        self.samples.splice(offset..offset, samples.iter().copied());
        Ok(())
    }

    /// Insert `count` zero samples before the stripe-local `offset`
    pub fn insert_silence(&mut self, offset: usize, count: usize) -> SfResult<()> {
        self.check(offset, 0, "insert at")?;
        self.samples.try_reserve(count)?;
        self.samples
            .splice(offset..offset, std::iter::repeat_n(0, count));
        Ok(())
    }

    /// Replace samples in place, never changes the length
    pub fn overwrite(&mut self, offset: usize, samples: &[Sample]) -> SfResult<()> {
        self.check(offset, samples.len(), "overwrite")?;
        self.samples[offset..offset + samples.len()].copy_from_slice(samples);
        Ok(())
    }

    pub fn read(&self, offset: usize, count: usize) -> SfResult<Vec<Sample>> {
        self.check(offset, count, "read")?;
        let mut out = Vec::new();
        out.try_reserve_exact(count)?;
        out.extend_from_slice(&self.samples[offset..offset + count]);
        Ok(out)
    }

    pub fn read_into(&self, offset: usize, out: &mut [Sample]) -> SfResult<()> {
        self.check(offset, out.len(), "read")?;
        out.copy_from_slice(&self.samples[offset..offset + out.len()]);
        Ok(())
    }

    pub fn delete(&mut self, offset: usize, count: usize) -> SfResult<()> {
        self.check(offset, count, "delete")?;
        self.samples.drain(offset..offset + count);
        Ok(())
    }

    /// Split at the stripe-local `offset`; `self` keeps the head, the
    /// returned stripe holds the tail
    pub fn split_off(&mut self, offset: usize) -> SfResult<Stripe> {
        self.check(offset, 0, "split at")?;
        let tail = Stripe::from_slice(self.start + offset as u64, &self.samples[offset..])?;
        self.samples.truncate(offset);
        Ok(tail)
    }
}
