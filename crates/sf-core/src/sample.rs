//! Sample type and conversions
//!
//! Samples are stored as 24-bit signed values held in an `i32`. Codecs
//! convert from and to their native representation at the edges.

/// A single audio sample (24-bit logical range)
pub type Sample = i32;

/// Number of significant bits in a [`Sample`]
pub const SAMPLE_BITS: u32 = 24;

/// Largest representable sample value
pub const SAMPLE_MAX: Sample = (1 << (SAMPLE_BITS - 1)) - 1;

/// Smallest representable sample value
pub const SAMPLE_MIN: Sample = -(1 << (SAMPLE_BITS - 1));

/// Bytes of storage per sample, used for undo memory accounting
pub const SAMPLE_STORAGE_BYTES: usize = std::mem::size_of::<Sample>();

/// Clamp an arbitrary integer into the sample range
#[inline]
pub fn clamp_sample(value: i64) -> Sample {
    value.clamp(SAMPLE_MIN as i64, SAMPLE_MAX as i64) as Sample
}

/// Convert a normed float (-1.0 .. +1.0) into a sample, clipping overshoots
#[inline]
pub fn sample_from_f64(value: f64) -> Sample {
    if value.is_nan() {
        return 0;
    }
    clamp_sample((value * (SAMPLE_MAX as f64 + 1.0)).round() as i64)
}

#[inline]
pub fn sample_from_f32(value: f32) -> Sample {
    sample_from_f64(value as f64)
}

/// Convert a sample into a normed float in -1.0 .. +1.0
#[inline]
pub fn sample_to_f64(sample: Sample) -> f64 {
    sample as f64 / (SAMPLE_MAX as f64 + 1.0)
}

#[inline]
pub fn sample_to_f32(sample: Sample) -> f32 {
    sample_to_f64(sample) as f32
}

/// Convert an integer sample of `bits` width into the internal representation
#[inline]
pub fn sample_from_int(value: i32, bits: u32) -> Sample {
    debug_assert!((1..=32).contains(&bits));
    if bits >= SAMPLE_BITS {
        value >> (bits - SAMPLE_BITS)
    } else {
        clamp_sample((value as i64) << (SAMPLE_BITS - bits))
    }
}

/// Convert an internal sample into an integer of `bits` width
#[inline]
pub fn sample_to_int(sample: Sample, bits: u32) -> i32 {
    debug_assert!((1..=32).contains(&bits));
    if bits >= SAMPLE_BITS {
        ((sample as i64) << (bits - SAMPLE_BITS)) as i32
    } else {
        sample >> (SAMPLE_BITS - bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_limits() {
        assert_eq!(SAMPLE_MAX, 8_388_607);
        assert_eq!(SAMPLE_MIN, -8_388_608);
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(sample_from_f64(0.0), 0);
        assert_eq!(sample_from_f64(-1.0), SAMPLE_MIN);
        assert_eq!(sample_from_f64(1.0), SAMPLE_MAX);
        assert_eq!(sample_from_f64(2.5), SAMPLE_MAX);
        assert_eq!(sample_from_f64(f64::NAN), 0);
        assert_relative_eq!(sample_to_f64(sample_from_f64(0.5)), 0.5, epsilon = 1e-6);
        assert_relative_eq!(sample_to_f32(SAMPLE_MIN), -1.0);
    }

    #[test]
    fn test_int_conversion() {
        assert_eq!(sample_from_int(i16::MAX as i32, 16), (i16::MAX as i32) << 8);
        assert_eq!(sample_to_int((i16::MIN as i32) << 8, 16), i16::MIN as i32);
        assert_eq!(sample_to_int(SAMPLE_MAX, 32), SAMPLE_MAX << 8);
        assert_eq!(sample_from_int(SAMPLE_MAX << 8, 32), SAMPLE_MAX);
        assert_eq!(sample_from_int(1234, 24), 1234);
    }
}
