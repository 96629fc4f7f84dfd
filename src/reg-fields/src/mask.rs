// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::{Range, RangeInclusive};

use crate::bytes::bit_string;
use crate::{LayoutError, RegisterError};

/// A span of bits `[offset, offset + width)`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRange {
    /// Index of the lowest bit.
    pub offset: u32,
    /// Number of bits.
    pub width: u32,
}

impl FieldRange {
    /// Constructs a range of `width` bits starting at `offset`.
    #[must_use]
    pub const fn new(offset: u32, width: u32) -> Self {
        Self { offset, width }
    }

    /// Exclusive end of the range.
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.offset.saturating_add(self.width)
    }

    /// Bits covered by the range, bits at index 128 and above are dropped.
    ///
    /// ```
    /// use reg_fields::FieldRange;
    /// assert_eq!(FieldRange::new(0, 1).mask(), 0b1);
    /// assert_eq!(FieldRange::new(1, 3).mask(), 0b1110);
    /// assert_eq!(FieldRange::new(0, 128).mask(), u128::MAX);
    /// ```
    #[must_use]
    pub const fn mask(&self) -> u128 {
        low_bits(self.end()) & !low_bits(self.offset)
    }

    /// Largest value the range can hold.
    #[must_use]
    pub const fn max(&self) -> u128 {
        low_bits(self.width)
    }

    /// Returns `true` if `self` and `other` share at least one bit.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Single bit shorthand.
impl From<u32> for FieldRange {
    fn from(bit: u32) -> Self {
        Self::new(bit, 1)
    }
}

impl From<Range<u32>> for FieldRange {
    fn from(range: Range<u32>) -> Self {
        Self::new(range.start, range.end.saturating_sub(range.start))
    }
}

impl From<RangeInclusive<u32>> for FieldRange {
    fn from(range: RangeInclusive<u32>) -> Self {
        let (start, end) = range.into_inner();
        Self::new(start, end.saturating_add(1).saturating_sub(start))
    }
}

impl fmt::Display for FieldRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width == 1 {
            write!(f, "{:02}", self.offset)
        } else {
            write!(f, "{:02}..{:02}", self.offset, self.end())
        }
    }
}

/// `u128` with the low `n` bits set.
const fn low_bits(n: u32) -> u128 {
    match 1u128.checked_shl(n) {
        Some(x) => x.wrapping_sub(1),
        None => u128::MAX,
    }
}

/// Bits of a container that belong to declared fields.
///
/// Bits outside the mask are reserved and must stay zero.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mask {
    bits: u128,
    total_bits: u32,
}

impl Mask {
    /// Builds a mask covering `ranges`, as wide as the furthest range end.
    ///
    /// # Errors
    ///
    /// When a range ends past bit 128.
    pub fn new<I>(ranges: I) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = FieldRange>,
    {
        let ranges = ranges.into_iter().collect::<Vec<_>>();
        let total_bits = ranges.iter().map(FieldRange::end).max().unwrap_or(0);
        Self::with_width(total_bits, ranges)
    }

    /// Builds a mask of `total_bits` covering `ranges`.
    ///
    /// # Errors
    ///
    /// When `total_bits` or a range end is past bit 128.
    pub fn with_width<I>(total_bits: u32, ranges: I) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = FieldRange>,
    {
        if total_bits > u128::BITS {
            return Err(LayoutError::MaskTooWide(total_bits));
        }
        let bits = ranges.into_iter().try_fold(0u128, |acc, range| {
            if range.end() > u128::BITS {
                Err(LayoutError::MaskTooWide(range.end()))
            } else {
                Ok(acc | range.mask())
            }
        })?;
        Ok(Self { bits, total_bits })
    }

    /// A mask of `total_bits` with every bit allowed.
    ///
    /// # Errors
    ///
    /// When `total_bits` is past bit 128.
    pub fn open(total_bits: u32) -> Result<Self, LayoutError> {
        Self::with_width(total_bits, [FieldRange::new(0, total_bits)])
    }

    /// Infallible constructor for declarations already validated by the macros.
    pub(crate) fn from_checked(total_bits: u32, ranges: impl IntoIterator<Item = FieldRange>) -> Self {
        let bits = ranges
            .into_iter()
            .fold(0u128, |acc, range| acc | range.mask());
        Self {
            bits,
            total_bits: total_bits.min(u128::BITS),
        }
    }

    /// Allowed bits.
    #[must_use]
    pub const fn bits(&self) -> u128 {
        self.bits
    }

    /// Reserved bits within `total_bits`.
    #[must_use]
    pub const fn reserved(&self) -> u128 {
        !self.bits & low_bits(self.total_bits)
    }

    /// Width of the mask.
    #[must_use]
    pub const fn total_bits(&self) -> u32 {
        self.total_bits
    }

    /// Checks `value` sets no reserved bit. Bits at or above `total_bits` are not considered.
    ///
    /// ```
    /// use reg_fields::{FieldRange, Mask, RegisterError};
    /// let mask = Mask::with_width(8, [FieldRange::new(0, 3)]).unwrap();
    /// assert_eq!(mask.validate(0b111), Ok(()));
    /// assert_eq!(
    ///     mask.validate(0b10_0101),
    ///     Err(RegisterError::ReservedBitViolation(vec![5]))
    /// );
    /// ```
    ///
    /// # Errors
    ///
    /// [`RegisterError::ReservedBitViolation`] listing every offending bit, lowest first.
    pub fn validate(&self, value: u128) -> Result<(), RegisterError> {
        let invalid = value & self.reserved();
        if invalid == 0 {
            return Ok(());
        }
        let bits = (0..self.total_bits)
            .filter(|i| (invalid >> i) & 1 == 1)
            .collect();
        Err(RegisterError::ReservedBitViolation(bits))
    }

    /// Returns `true` if `value` sets no reserved bit.
    #[must_use]
    pub fn contains(&self, value: u128) -> bool {
        self.validate(value).is_ok()
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bit_string(self.bits, self.total_bits))
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn range_conversions() {
        assert_eq!(FieldRange::from(5u32), FieldRange::new(5, 1));
        assert_eq!(FieldRange::from(4u32..8), FieldRange::new(4, 4));
        assert_eq!(FieldRange::from(4u32..=7), FieldRange::new(4, 4));
        assert_eq!(FieldRange::from(8u32..4), FieldRange::new(8, 0));
        assert_eq!(FieldRange::new(3, 2).to_string(), "03..05");
        assert_eq!(FieldRange::new(3, 1).to_string(), "03");
    }

    #[test]
    fn range_mask() {
        assert_eq!(FieldRange::new(0, 0).mask(), 0);
        assert_eq!(FieldRange::new(4, 4).mask(), 0xf0);
        assert_eq!(FieldRange::new(127, 1).mask(), 1 << 127);
        assert_eq!(FieldRange::new(120, 16).mask(), 0xff << 120);
        assert_eq!(FieldRange::new(0, 64).max(), u128::from(u64::MAX));
        assert_eq!(FieldRange::new(0, 128).max(), u128::MAX);
    }

    #[test]
    fn overlap() {
        let a = FieldRange::new(0, 4);
        assert!(a.overlaps(&FieldRange::new(3, 1)));
        assert!(!a.overlaps(&FieldRange::new(4, 1)));
        assert!(FieldRange::new(4, 8).overlaps(&FieldRange::new(0, 5)));
    }

    #[test]
    fn build() {
        let mask = Mask::new([FieldRange::new(0, 1), FieldRange::new(1, 3)]).unwrap();
        assert_eq!(mask.bits(), 0b1111);
        assert_eq!(mask.total_bits(), 4);
        assert_eq!(mask.to_string(), "1111");

        let empty = Mask::new([]).unwrap();
        assert_eq!(empty.total_bits(), 0);
        assert_eq!(empty.validate(u128::MAX), Ok(()));

        assert_eq!(
            Mask::new([FieldRange::new(120, 9)]),
            Err(LayoutError::MaskTooWide(129))
        );
        assert_eq!(
            Mask::with_width(136, []),
            Err(LayoutError::MaskTooWide(136))
        );
    }

    #[test]
    fn idempotent() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let ranges = (0..rng.gen_range(0..8))
                .map(|_| {
                    let offset = rng.gen_range(0..120);
                    FieldRange::new(offset, rng.gen_range(1..=8))
                })
                .collect::<Vec<_>>();
            let a = Mask::with_width(128, ranges.clone()).unwrap();
            let b = Mask::with_width(128, ranges).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.to_string(), b.to_string());
        }
    }

    #[test]
    fn reject() {
        let bits = [0u32, 1, 2].map(FieldRange::from);
        let mask = Mask::with_width(8, bits).unwrap();
        assert_eq!(mask.reserved(), 0b1111_1000);
        assert_eq!(mask.validate(0b0000_0111), Ok(()));
        assert_eq!(
            mask.validate(0b0010_0000),
            Err(RegisterError::ReservedBitViolation(vec![5]))
        );
        assert_eq!(
            mask.validate(0b1010_1001),
            Err(RegisterError::ReservedBitViolation(vec![3, 5, 7]))
        );
        assert!(mask.contains(0b101));
        assert!(!mask.contains(0b1000));
        // Bits past the mask width are truncated.
        assert!(mask.contains(1 << 9));
    }

    #[test]
    fn open() {
        let mask = Mask::open(16).unwrap();
        assert_eq!(mask.bits(), 0xffff);
        assert_eq!(mask.reserved(), 0);
        assert!(mask.contains(0xffff));
        assert_eq!(Mask::open(128).unwrap().bits(), u128::MAX);
    }
}
