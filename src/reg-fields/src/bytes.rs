// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Conversions between integers, booleans, byte buffers and hex text.
//!
//! Every multi-byte encoding in this crate is little-endian, the byte order of the x86 structures
//! it models. Hex text is read the way it is written (most significant digit first) and then
//! encoded little-endian like the integer it spells, so `"0x0102"` and `0x0102` produce the same
//! bytes `[0x02, 0x01]`.

use std::fmt;

use crate::RegisterError;

/// Number of bytes in the widest supported raw integer.
pub const MAX_INT_BYTES: usize = 16;

/// A value accepted at the API boundary.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unsigned integer.
    Int(u128),
    /// Boolean, encoded as a single bit or byte.
    Bool(bool),
    /// Little-endian byte buffer.
    Bytes(Vec<u8>),
    /// Hex numeral, e.g. `"0x1f"` or `"dead_beef"`.
    Text(String),
}

/// The kind of a [`Value`], used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, displaydoc::Display)]
pub enum ValueKind {
    /// integer
    Int,
    /// boolean
    Bool,
    /// bytes
    Bytes,
    /// text
    Text,
}

impl Value {
    /// Returns the kind of `self`.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Bool(_) => ValueKind::Bool,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Text(_) => ValueKind::Text,
        }
    }
}

macro_rules! value_from_uint {
    ($($x:ty),*) => {
        $(
            impl From<$x> for Value {
                fn from(x: $x) -> Self {
                    Self::Int(u128::from(x))
                }
            }
        )*
    };
}
value_from_uint!(u8, u16, u32, u64, u128);

impl From<bool> for Value {
    fn from(x: bool) -> Self {
        Self::Bool(x)
    }
}

impl From<Vec<u8>> for Value {
    fn from(x: Vec<u8>) -> Self {
        Self::Bytes(x)
    }
}

impl From<&[u8]> for Value {
    fn from(x: &[u8]) -> Self {
        Self::Bytes(x.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Value {
    fn from(x: [u8; N]) -> Self {
        Self::Bytes(x.to_vec())
    }
}

impl From<&str> for Value {
    fn from(x: &str) -> Self {
        Self::Text(String::from(x))
    }
}

impl From<String> for Value {
    fn from(x: String) -> Self {
        Self::Text(x)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(x) => write!(f, "{x:#x}"),
            Self::Bool(x) => write!(f, "{x}"),
            Self::Bytes(x) => write!(f, "{x:02x?}"),
            Self::Text(x) => write!(f, "{x:?}"),
        }
    }
}

/// Number of significant bits in `x`, `0` for `0`.
#[must_use]
pub const fn bit_length(x: u128) -> u32 {
    u128::BITS - x.leading_zeros()
}

/// Returns the number of bits needed to represent `value`.
///
/// ```
/// use reg_fields::bytes::size_in_bits;
/// assert_eq!(size_in_bits(&0u8.into()).unwrap(), 0);
/// assert_eq!(size_in_bits(&5u8.into()).unwrap(), 3);
/// assert_eq!(size_in_bits(&true.into()).unwrap(), 1);
/// assert_eq!(size_in_bits(&vec![0u8, 0].into()).unwrap(), 16);
/// ```
///
/// # Errors
///
/// [`RegisterError::TypeMismatch`] for [`Value::Text`].
pub fn size_in_bits(value: &Value) -> Result<u32, RegisterError> {
    match value {
        Value::Bool(_) => Ok(1),
        Value::Int(x) => Ok(bit_length(*x)),
        Value::Bytes(x) => u32::try_from(x.len())
            .ok()
            .and_then(|len| len.checked_mul(8))
            .ok_or(RegisterError::ValueTooLarge {
                required: x.len(),
                capacity: (u32::MAX / 8) as usize,
            }),
        Value::Text(_) => Err(RegisterError::TypeMismatch(ValueKind::Text)),
    }
}

/// Returns the number of bytes needed to store `value`, at least 1 for integers and booleans.
///
/// # Errors
///
/// [`RegisterError::TypeMismatch`] for [`Value::Text`].
pub fn size_in_bytes(value: &Value) -> Result<usize, RegisterError> {
    match value {
        Value::Bool(_) => Ok(1),
        Value::Int(x) => Ok(int_size_in_bytes(*x)),
        Value::Bytes(x) => Ok(x.len()),
        Value::Text(_) => Err(RegisterError::TypeMismatch(ValueKind::Text)),
    }
}

/// Minimal byte length of `x`, `1` for `0`.
pub(crate) fn int_size_in_bytes(x: u128) -> usize {
    // At most 16, the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation)]
    let bytes = bit_length(x).div_ceil(8) as usize;
    bytes.max(1)
}

/// Encodes `value` as little-endian bytes, zero padded on the right to at least
/// `minimal_width` bytes.
///
/// ```
/// use reg_fields::bytes::to_bytes;
/// assert_eq!(to_bytes(&0x0102u16.into(), 4).unwrap(), [0x02, 0x01, 0x00, 0x00]);
/// assert_eq!(to_bytes(&"0x0102".into(), 0).unwrap(), [0x02, 0x01]);
/// assert_eq!(to_bytes(&true.into(), 1).unwrap(), [0x01]);
/// ```
///
/// # Errors
///
/// [`RegisterError::TypeMismatch`] when text is not a hex numeral.
pub fn to_bytes(value: &Value, minimal_width: usize) -> Result<Vec<u8>, RegisterError> {
    let mut bytes = match value {
        Value::Bool(x) => vec![u8::from(*x)],
        Value::Int(x) => x.to_le_bytes()[..int_size_in_bytes(*x)].to_vec(),
        Value::Bytes(x) => x.clone(),
        Value::Text(x) => hex_to_bytes(x)?,
    };
    if bytes.len() < minimal_width {
        bytes.resize(minimal_width, 0);
    }
    Ok(bytes)
}

/// Decodes little-endian `buf` into an integer. Trailing zero bytes are ignored.
///
/// # Errors
///
/// [`RegisterError::ValueTooLarge`] when `buf` has more than 16 significant bytes.
pub fn bytes_to_int(buf: &[u8]) -> Result<u128, RegisterError> {
    let significant = buf.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    if significant > MAX_INT_BYTES {
        return Err(RegisterError::ValueTooLarge {
            required: significant,
            capacity: MAX_INT_BYTES,
        });
    }
    let mut le = [0u8; MAX_INT_BYTES];
    le[..significant].copy_from_slice(&buf[..significant]);
    Ok(u128::from_le_bytes(le))
}

/// Decodes `value` as an integer.
///
/// # Errors
///
/// [`RegisterError::TypeMismatch`] for text that is not hex, [`RegisterError::ValueTooLarge`]
/// when the value does not fit in 128 bits.
pub fn to_int(value: &Value) -> Result<u128, RegisterError> {
    match value {
        Value::Int(x) => Ok(*x),
        Value::Bool(x) => Ok(u128::from(*x)),
        Value::Bytes(x) => bytes_to_int(x),
        Value::Text(x) => bytes_to_int(&hex_to_bytes(x)?),
    }
}

/// Renders the low `width` bits of `value`, most significant bit first.
///
/// ```
/// assert_eq!(reg_fields::bytes::bit_string(0b101, 6), "000101");
/// ```
#[must_use]
pub fn bit_string(value: u128, width: u32) -> String {
    (0..width)
        .rev()
        .map(|i| {
            if i < u128::BITS && (value >> i) & 1 == 1 {
                '1'
            } else {
                '0'
            }
        })
        .collect()
}

/// Parses a hex numeral into little-endian bytes, one byte per two digits.
fn hex_to_bytes(text: &str) -> Result<Vec<u8>, RegisterError> {
    let trimmed = text.trim();
    let mut digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .replace('_', "");
    if digits.is_empty() {
        return Err(RegisterError::TypeMismatch(ValueKind::Text));
    }
    // A leading zero nibble keeps odd digit counts byte aligned.
    if digits.len() % 2 == 1 {
        digits.insert(0, '0');
    }
    let mut bytes =
        hex::decode(&digits).map_err(|_| RegisterError::TypeMismatch(ValueKind::Text))?;
    bytes.reverse();
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    const ITERATIONS: usize = 1000;

    #[test]
    fn sizes() {
        assert_eq!(size_in_bits(&Value::Int(0)), Ok(0));
        assert_eq!(size_in_bits(&Value::Int(1)), Ok(1));
        assert_eq!(size_in_bits(&Value::Int(0xff)), Ok(8));
        assert_eq!(size_in_bits(&Value::Int(0x100)), Ok(9));
        assert_eq!(size_in_bits(&Value::Int(u128::MAX)), Ok(128));
        assert_eq!(size_in_bits(&Value::Bool(false)), Ok(1));
        assert_eq!(size_in_bits(&Value::Bytes(vec![0; 3])), Ok(24));

        assert_eq!(size_in_bytes(&Value::Int(0)), Ok(1));
        assert_eq!(size_in_bytes(&Value::Int(0xff)), Ok(1));
        assert_eq!(size_in_bytes(&Value::Int(0x100)), Ok(2));
        assert_eq!(size_in_bytes(&Value::Bool(true)), Ok(1));
        assert_eq!(size_in_bytes(&Value::Bytes(vec![1, 2, 3, 4, 5])), Ok(5));
    }

    #[test]
    fn text_has_no_size() {
        assert_eq!(
            size_in_bits(&Value::from("0x10")),
            Err(RegisterError::TypeMismatch(ValueKind::Text))
        );
        assert_eq!(
            size_in_bytes(&Value::from("0x10")),
            Err(RegisterError::TypeMismatch(ValueKind::Text))
        );
    }

    #[test]
    fn encode() {
        assert_eq!(to_bytes(&Value::Int(0), 0).unwrap(), [0]);
        assert_eq!(to_bytes(&Value::Int(0), 4).unwrap(), [0, 0, 0, 0]);
        assert_eq!(to_bytes(&Value::Int(0x1234), 1).unwrap(), [0x34, 0x12]);
        assert_eq!(to_bytes(&Value::Bool(true), 2).unwrap(), [1, 0]);
        assert_eq!(to_bytes(&Value::Bool(false), 0).unwrap(), [0]);
        assert_eq!(to_bytes(&Value::Bytes(vec![9]), 3).unwrap(), [9, 0, 0]);
    }

    #[test]
    fn encode_text() {
        assert_eq!(to_bytes(&"0x0102".into(), 0).unwrap(), [0x02, 0x01]);
        assert_eq!(to_bytes(&"102".into(), 0).unwrap(), [0x02, 0x01]);
        assert_eq!(to_bytes(&"0X1_02".into(), 3).unwrap(), [0x02, 0x01, 0x00]);
        assert_eq!(to_bytes(&"0x0000_0001".into(), 0).unwrap(), [1, 0, 0, 0]);
        assert_eq!(to_bytes(&"DEADbeef".into(), 0).unwrap(), [0xef, 0xbe, 0xad, 0xde]);
        // Text and integers agree on byte order.
        assert_eq!(
            to_bytes(&"0xfee00900".into(), 8).unwrap(),
            to_bytes(&Value::Int(0xfee0_0900), 8).unwrap()
        );
        for bad in ["", "0x", "0xg1", "hello", "0x1 2"] {
            assert_eq!(
                to_bytes(&bad.into(), 0),
                Err(RegisterError::TypeMismatch(ValueKind::Text)),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn decode() {
        assert_eq!(bytes_to_int(&[]), Ok(0));
        assert_eq!(bytes_to_int(&[0x34, 0x12]), Ok(0x1234));
        assert_eq!(bytes_to_int(&[1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]), Ok(1));
        assert_eq!(
            bytes_to_int(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]),
            Err(RegisterError::ValueTooLarge {
                required: 17,
                capacity: 16
            })
        );
        assert_eq!(to_int(&"0x10".into()), Ok(16));
        assert_eq!(to_int(&true.into()), Ok(1));
    }

    #[test]
    fn round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..ITERATIONS {
            let width = rng.gen_range(1..=MAX_INT_BYTES);
            let bits = u32::try_from(width * 8).unwrap();
            let v = rng.gen::<u128>() >> (u128::BITS - bits);
            let bytes = to_bytes(&Value::Int(v), width).unwrap();
            assert_eq!(bytes.len(), width);
            assert_eq!(bytes_to_int(&bytes), Ok(v), "{v:#x} in {width} bytes");
        }
    }

    #[test]
    fn bits() {
        assert_eq!(bit_string(0, 0), "");
        assert_eq!(bit_string(0b1011, 4), "1011");
        assert_eq!(bit_string(0b1011, 8), "00001011");
        assert_eq!(bit_string(u128::MAX, 130).len(), 130);
        assert!(bit_string(u128::MAX, 130).starts_with("001"));
    }
}
