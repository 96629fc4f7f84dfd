// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::bytes::{self, bit_string, size_in_bits, Value};
use crate::display::Table;
use crate::{Access, Field, FieldRange, FieldValue, Layout, RegisterError};

/// A fixed size register value, read and written through the fields of its [`Layout`].
///
/// Every write is validated against the layout's mask before it is committed; a failed write
/// leaves the register unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct Register {
    layout: Arc<Layout>,
    raw: u128,
}

impl Register {
    /// Constructs a register holding zero.
    #[must_use]
    pub fn zeroed(layout: Arc<Layout>) -> Self {
        Self { layout, raw: 0 }
    }

    /// Constructs a register from an integer or little-endian bytes.
    ///
    /// # Errors
    ///
    /// - [`RegisterError::TypeMismatch`] for booleans and text.
    /// - [`RegisterError::ValueTooLarge`] when the value needs more bytes than the layout holds.
    /// - [`RegisterError::ReservedBitViolation`] when the value sets reserved bits.
    pub fn new(layout: Arc<Layout>, value: impl Into<Value>) -> Result<Self, RegisterError> {
        let mut register = Self::zeroed(layout);
        register.set_value(value.into())?;
        Ok(register)
    }

    /// Constructs an untyped register sized to the minimal byte length of `value`, in which every
    /// bit is writable.
    ///
    /// # Errors
    ///
    /// As [`Register::new`], and [`RegisterError::ValueTooLarge`] past 16 bytes.
    pub fn infer(value: impl Into<Value>) -> Result<Self, RegisterError> {
        let value = value.into();
        if matches!(value, Value::Bool(_) | Value::Text(_)) {
            return Err(RegisterError::TypeMismatch(value.kind()));
        }
        // An empty buffer is zero, which takes one byte.
        let size = bytes::size_in_bytes(&value)?.max(1);
        let layout = Layout::open("raw", size).map_err(|_| RegisterError::ValueTooLarge {
            required: size,
            capacity: bytes::MAX_INT_BYTES,
        })?;
        Self::new(Arc::new(layout), value)
    }

    /// Builds a register by assigning each named field.
    ///
    /// # Errors
    ///
    /// [`RegisterError::UnknownField`] for names not in `layout`, otherwise as [`Register::set`].
    pub fn from_field_map<I, K>(layout: Arc<Layout>, map: I) -> Result<Self, RegisterError>
    where
        I: IntoIterator<Item = (K, u128)>,
        K: AsRef<str>,
    {
        map.into_iter()
            .try_fold(Self::zeroed(layout), |mut register, (name, value)| {
                register.set_by_name(name.as_ref(), value)?;
                Ok(register)
            })
    }

    /// Layout of the register.
    #[must_use]
    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Raw value.
    #[must_use]
    pub const fn raw(&self) -> u128 {
        self.raw
    }

    /// Exactly [`Register::size`] little-endian bytes.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.raw.to_le_bytes()[..self.size()].to_vec()
    }

    /// The raw value in binary, most significant bit first, one digit per bit of the register.
    #[must_use]
    pub fn to_bin_string(&self) -> String {
        bit_string(self.raw, self.layout.total_bits())
    }

    /// Replaces the whole value.
    ///
    /// # Errors
    ///
    /// [`RegisterError::ValueTooLarge`] or [`RegisterError::ReservedBitViolation`].
    pub fn set_raw(&mut self, raw: u128) -> Result<(), RegisterError> {
        self.set_value(Value::Int(raw))
    }

    /// Replaces the whole value with little-endian `bytes`.
    ///
    /// # Errors
    ///
    /// [`RegisterError::ValueTooLarge`] or [`RegisterError::ReservedBitViolation`].
    pub fn set_bytes(&mut self, bytes: &[u8]) -> Result<(), RegisterError> {
        self.set_value(Value::from(bytes))
    }

    /// Replaces the whole value with an integer or little-endian bytes.
    ///
    /// # Errors
    ///
    /// As [`Register::new`].
    pub fn set_value(&mut self, value: Value) -> Result<(), RegisterError> {
        let required = match &value {
            Value::Int(_) | Value::Bytes(_) => bytes::size_in_bytes(&value)?,
            Value::Bool(_) | Value::Text(_) => {
                return Err(RegisterError::TypeMismatch(value.kind()))
            }
        };
        if required > self.size() {
            return Err(RegisterError::ValueTooLarge {
                required,
                capacity: self.size(),
            });
        }
        let raw = bytes::to_int(&value)?;
        self.commit(raw)
    }

    /// Returns the bits of `range` shifted down to bit 0.
    ///
    /// # Errors
    ///
    /// [`RegisterError::UnsupportedRange`] for empty ranges and ranges past the end of the
    /// register.
    pub fn get_range(&self, range: impl Into<FieldRange>) -> Result<u128, RegisterError> {
        let range = self.check_range(range.into())?;
        Ok((self.raw & range.mask()) >> range.offset)
    }

    /// Writes `value` into the bits of `range`, leaving every other bit unchanged.
    ///
    /// # Errors
    ///
    /// - [`RegisterError::UnsupportedRange`] as [`Register::get_range`].
    /// - [`RegisterError::ValueTooWide`] when `value` does not fit in the range.
    /// - [`RegisterError::ReservedBitViolation`] when the result sets reserved bits.
    pub fn set_range(
        &mut self,
        range: impl Into<FieldRange>,
        value: u128,
    ) -> Result<(), RegisterError> {
        let range = self.check_range(range.into())?;
        if value > range.max() {
            return Err(RegisterError::ValueTooWide {
                value,
                width: range.width,
            });
        }
        let candidate = (self.raw & !range.mask()) | (value << range.offset);
        self.commit(candidate)
    }

    /// Looks up a field of this register's layout by name.
    ///
    /// # Errors
    ///
    /// [`RegisterError::UnknownField`].
    pub fn field(&self, name: &str) -> Result<&Field, RegisterError> {
        self.layout
            .field(name)
            .ok_or_else(|| RegisterError::UnknownField(String::from(name)))
    }

    /// Reads a field.
    ///
    /// # Errors
    ///
    /// [`RegisterError::UnsupportedRange`] when `field` lies outside the register.
    pub fn get(&self, field: &Field) -> Result<FieldValue, RegisterError> {
        let raw = self.get_range(field.range())?;
        Ok(FieldValue::new(field, raw))
    }

    /// Writes a field.
    ///
    /// # Errors
    ///
    /// - [`RegisterError::ImmutableField`] for read-only fields.
    /// - [`RegisterError::FieldTooWide`] when `value` needs more bits than the field has.
    /// - As [`Register::set_range`] otherwise.
    pub fn set(&mut self, field: &Field, value: impl Into<Value>) -> Result<(), RegisterError> {
        if field.access() == Access::ReadOnly {
            return Err(RegisterError::ImmutableField(field.name()));
        }
        let value = value.into();
        let required = size_in_bits(&value)?;
        if required > field.width() {
            return Err(RegisterError::FieldTooWide {
                field: field.name(),
                width: field.width(),
                required,
            });
        }
        let value = bytes::to_int(&value)?;
        self.set_range(field.range(), value)
    }

    /// Reads a field by name.
    ///
    /// # Errors
    ///
    /// [`RegisterError::UnknownField`].
    pub fn get_by_name(&self, name: &str) -> Result<FieldValue, RegisterError> {
        let field = *self.field(name)?;
        self.get(&field)
    }

    /// Writes a field by name.
    ///
    /// # Errors
    ///
    /// [`RegisterError::UnknownField`], otherwise as [`Register::set`].
    pub fn set_by_name(&mut self, name: &str, value: impl Into<Value>) -> Result<(), RegisterError> {
        let field = *self.field(name)?;
        self.set(&field, value)
    }

    /// Names of the single bit fields currently set, in declaration order.
    #[must_use]
    pub fn flags(&self) -> Vec<&'static str> {
        self.layout
            .fields()
            .iter()
            .filter(|field| field.is_flag() && self.raw & field.range().mask() != 0)
            .map(Field::name)
            .collect()
    }

    /// Values of every non-reserved field, keyed by name.
    #[must_use]
    pub fn field_values(&self) -> BTreeMap<&'static str, u128> {
        self.layout
            .fields()
            .iter()
            .filter(|field| !field.is_reserved())
            .map(|field| (field.name(), self.read_unchecked(field)))
            .collect()
    }

    /// Every field with its current value, in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&Field, FieldValue)> + '_ {
        self.layout
            .fields()
            .iter()
            .map(|field| (field, FieldValue::new(field, self.read_unchecked(field))))
    }

    // Layout fields are within bounds.
    fn read_unchecked(&self, field: &Field) -> u128 {
        (self.raw & field.range().mask()) >> field.offset()
    }

    fn check_range(&self, range: FieldRange) -> Result<FieldRange, RegisterError> {
        let total = self.layout.total_bits();
        if range.width == 0 || range.end() > total {
            return Err(RegisterError::UnsupportedRange {
                start: range.offset,
                stop: range.end(),
                total,
            });
        }
        Ok(range)
    }

    fn commit(&mut self, candidate: u128) -> Result<(), RegisterError> {
        if let Err(err) = self.layout.mask().validate(candidate) {
            log::debug!(
                "{}: rejected write of {candidate:#x}: {err}",
                self.layout.name()
            );
            return Err(err);
        }
        self.raw = candidate;
        Ok(())
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.layout.name())
            .field("raw", &format_args!("{:#0w$x}", self.raw, w = self.size() * 2 + 2))
            .finish()
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        for (field, value) in self.values() {
            table.column(&field.range().to_string(), field.name(), &value.to_string());
        }
        write!(f, "{table}")
    }
}

impl fmt::LowerHex for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.raw, f)
    }
}

impl fmt::UpperHex for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.raw, f)
    }
}

impl fmt::Binary for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Binary::fmt(&self.raw, f)
    }
}

impl From<&Register> for u128 {
    fn from(register: &Register) -> Self {
        register.raw
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Register {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.field_values())
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;
    use crate::bytes::ValueKind;
    use crate::Variant;

    const ITERATIONS: usize = 1000;

    const A: Field = Field::new("A", 0, 1);
    const B: Field = Field::new("B", 1, 3);
    const KINDS: &[Variant] = &[Variant::new("EXTERNAL", 0), Variant::new("NMI", 2)];
    const KIND: Field = Field::new("KIND", 4, 3).enumerated(KINDS);

    fn layout() -> Arc<Layout> {
        Arc::new(Layout::new("Test", 1, [A, B, KIND]).unwrap())
    }

    #[test]
    fn scenario_register_field() {
        let mut register = Register::zeroed(layout());
        register.set(&A, 1u8).unwrap();
        register.set(&B, 5u8).unwrap();
        assert_eq!(register.raw(), 0b1011);
        assert_eq!(register.get(&A).unwrap(), 1);
        assert_eq!(register.get(&B).unwrap(), 5);
        assert_eq!(register.get_by_name("B").unwrap(), 5);
        assert_eq!(register.flags(), ["A"]);
    }

    #[test]
    fn construct() {
        let register = Register::new(layout(), 0b010_1011u8).unwrap();
        assert_eq!(register.get(&KIND).unwrap().variant(), Some("NMI"));
        assert_eq!(Register::new(layout(), vec![0x0b]).unwrap().raw(), 0x0b);
        assert_eq!(
            Register::new(layout(), 0x100u16),
            Err(RegisterError::ValueTooLarge {
                required: 2,
                capacity: 1
            })
        );
        assert_eq!(
            Register::new(layout(), vec![0, 0]),
            Err(RegisterError::ValueTooLarge {
                required: 2,
                capacity: 1
            })
        );
        assert_eq!(
            Register::new(layout(), 0x80u8),
            Err(RegisterError::ReservedBitViolation(vec![7]))
        );
        assert_eq!(
            Register::new(layout(), true),
            Err(RegisterError::TypeMismatch(ValueKind::Bool))
        );
        assert_eq!(
            Register::new(layout(), "0x1"),
            Err(RegisterError::TypeMismatch(ValueKind::Text))
        );
    }

    #[test]
    fn infer() {
        let register = Register::infer(0x1234u16).unwrap();
        assert_eq!(register.size(), 2);
        assert_eq!(register.get_range(8u32..16).unwrap(), 0x12);
        assert_eq!(Register::infer(0u8).unwrap().size(), 1);
        let empty = Register::infer(Vec::<u8>::new()).unwrap();
        assert_eq!(empty.size(), 1);
        assert_eq!(empty.raw(), 0);
        assert_eq!(Register::infer(vec![1, 2, 3]).unwrap().raw(), 0x0003_0201);
        assert!(matches!(
            Register::infer(vec![0; 17]),
            Err(RegisterError::ValueTooLarge { .. })
        ));
        assert_eq!(
            Register::infer(false),
            Err(RegisterError::TypeMismatch(ValueKind::Bool))
        );
    }

    #[test]
    fn bytes() {
        let layout = Arc::new(Layout::open("raw", 8).unwrap());
        let register = Register::new(layout.clone(), 1u8).unwrap();
        assert_eq!(register.bytes(), [1, 0, 0, 0, 0, 0, 0, 0]);
        let mut register = Register::zeroed(layout);
        register.set_bytes(&[0xef, 0xbe, 0xad, 0xde]).unwrap();
        assert_eq!(register.raw(), 0xdead_beef);
        assert_eq!(register.bytes().len(), 8);
        assert_eq!(register.to_bin_string().len(), 64);
    }

    #[test]
    fn ranges() {
        let mut register = Register::infer(vec![0u8; 4]).unwrap();
        register.set_range(4u32..8, 0xa).unwrap();
        register.set_range(31u32, 1).unwrap();
        assert_eq!(register.raw(), 0x8000_00a0);
        assert_eq!(register.get_range(4u32..=7).unwrap(), 0xa);
        assert_eq!(register.get_range(31u32).unwrap(), 1);
        assert_eq!(
            register.get_range(30u32..34),
            Err(RegisterError::UnsupportedRange {
                start: 30,
                stop: 34,
                total: 32
            })
        );
        assert_eq!(
            register.get_range(5u32..5),
            Err(RegisterError::UnsupportedRange {
                start: 5,
                stop: 5,
                total: 32
            })
        );
        assert_eq!(
            register.set_range(0u32..4, 0x10),
            Err(RegisterError::ValueTooWide {
                value: 0x10,
                width: 4
            })
        );
    }

    #[test]
    fn range_round_trip() {
        let mut rng = rand::thread_rng();
        let mut register = Register::infer(u128::MAX).unwrap();
        for _ in 0..ITERATIONS {
            let start = rng.gen_range(0..128);
            let stop = rng.gen_range(start + 1..=128);
            let range = FieldRange::from(start..stop);
            let value = rng.gen::<u128>() & range.max();
            let before = register.raw();

            register.set_range(range, value).unwrap();

            assert_eq!(register.get_range(range).unwrap(), value);
            assert_eq!(register.raw() & !range.mask(), before & !range.mask());
        }
    }

    #[test]
    fn mask_rejection() {
        let layout = Layout::new(
            "Low",
            1,
            [Field::new("X", 0, 1), Field::new("Y", 1, 1), Field::new("Z", 2, 1)],
        )
        .unwrap();
        let mut register = Register::zeroed(Arc::new(layout));
        register.set_range(0u32..3, 0b101).unwrap();
        assert_eq!(
            register.set_range(0u32..8, 0b0010_0101),
            Err(RegisterError::ReservedBitViolation(vec![5]))
        );
        assert_eq!(register.raw(), 0b101);
    }

    #[test]
    fn write_atomicity() {
        let mut rng = rand::thread_rng();
        let mut register = Register::new(layout(), 0b010_0101u8).unwrap();
        for _ in 0..ITERATIONS {
            let before = register.raw();
            let start = rng.gen_range(0u32..10);
            let stop = rng.gen_range(start..10);
            if register.set_range(start..stop, rng.gen_range(0..512)).is_err() {
                assert_eq!(register.raw(), before);
            }

            let before = register.raw();
            if register.set(&B, rng.gen_range(0u16..32)).is_err() {
                assert_eq!(register.raw(), before);
            }

            let before = register.raw();
            assert!(register.set(&KIND, 0u8).is_err());
            assert_eq!(register.raw(), before);
        }
    }

    #[test]
    fn enumerated_is_read_only() {
        let mut register = Register::new(layout(), 0b010_0000u8).unwrap();
        assert_eq!(
            register.set(&KIND, 0u8),
            Err(RegisterError::ImmutableField("KIND"))
        );
        assert_eq!(
            register.set_by_name("KIND", 0u8),
            Err(RegisterError::ImmutableField("KIND"))
        );
        assert_eq!(register.raw(), 0b010_0000);
        assert_eq!(register.get(&KIND).unwrap().to_string(), "NMI");
    }

    #[test]
    fn field_too_wide() {
        let mut register = Register::zeroed(layout());
        assert_eq!(
            register.set(&B, 8u8),
            Err(RegisterError::FieldTooWide {
                field: "B",
                width: 3,
                required: 4
            })
        );
        assert_eq!(
            register.set(&B, vec![1u8]),
            Err(RegisterError::FieldTooWide {
                field: "B",
                width: 3,
                required: 8
            })
        );
        register.set(&A, true).unwrap();
        assert_eq!(register.raw(), 1);
        assert_eq!(
            register.set(&A, "1"),
            Err(RegisterError::TypeMismatch(ValueKind::Text))
        );
        assert_eq!(
            register.set_by_name("C", 1u8),
            Err(RegisterError::UnknownField(String::from("C")))
        );
    }

    #[test]
    fn foreign_field() {
        let register = Register::zeroed(layout());
        let wide = Field::new("WIDE", 4, 8);
        assert!(matches!(
            register.get(&wide),
            Err(RegisterError::UnsupportedRange { .. })
        ));
    }

    #[test]
    fn field_map() {
        let register =
            Register::from_field_map(layout(), [("A", 1), ("B", 6)]).unwrap();
        assert_eq!(register.raw(), 0b1101);
        let map = register.field_values();
        assert_eq!(map.get("A"), Some(&1));
        assert_eq!(map.get("B"), Some(&6));
        assert_eq!(map.get("KIND"), Some(&0));
        assert_eq!(
            Register::from_field_map(layout(), [("Q", 1)]),
            Err(RegisterError::UnknownField(String::from("Q")))
        );
    }

    #[test]
    fn render() {
        let register = Register::new(layout(), 0b010_1011u8).unwrap();
        assert_eq!(format!("{register:?}"), "Test { raw: 0x2b }");
        assert_eq!(format!("{register:x}"), "2b");
        assert_eq!(format!("{register:#X}"), "0x2B");
        assert_eq!(format!("{register:b}"), "101011");
        let table = register.to_string();
        assert!(table.contains("KIND"));
        assert!(table.contains("NMI"));
        assert!(table.contains("01..04"));
        assert_eq!(table.lines().count(), 7);
    }
}
