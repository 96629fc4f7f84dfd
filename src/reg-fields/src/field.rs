// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::FieldRange;

/// A named value of an enumerated field.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variant {
    /// Name of the value, e.g. `NMI`.
    pub name: &'static str,
    /// Encoded value.
    pub value: u128,
}

impl Variant {
    /// Constructs a new variant.
    #[must_use]
    pub const fn new(name: &'static str, value: u128) -> Self {
        Self { name, value }
    }
}

/// How the value of a field is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repr {
    /// Plain unsigned integer.
    Unsigned,
    /// Single bit shown as `true`/`false`.
    Flag,
    /// Integer shown in hex, e.g. addresses.
    Hex,
    /// Integer with a fixed set of named values.
    Enumerated(&'static [Variant]),
}

/// Whether a field may be written through its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Field may be read and written.
    ReadWrite,
    /// Writes fail with [`crate::RegisterError::ImmutableField`].
    ReadOnly,
}

/// Declaration of a named sub-range of a register.
///
/// A descriptor holds no state; reads and writes go through [`crate::Register::get`] and
/// [`crate::Register::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    name: &'static str,
    description: &'static str,
    range: FieldRange,
    repr: Repr,
    access: Access,
}

impl Field {
    /// Declares a field of `width` bits at `offset`. Single bit fields are presented as flags.
    #[must_use]
    pub const fn new(name: &'static str, offset: u32, width: u32) -> Self {
        Self {
            name,
            description: "",
            range: FieldRange::new(offset, width),
            repr: if width == 1 { Repr::Flag } else { Repr::Unsigned },
            access: Access::ReadWrite,
        }
    }

    /// Attaches a human readable description.
    #[must_use]
    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Presents the value in hex.
    #[must_use]
    pub const fn hex(mut self) -> Self {
        self.repr = Repr::Hex;
        self
    }

    /// Declares the named values of the field. Enumerated fields are read-only.
    #[must_use]
    pub const fn enumerated(mut self, variants: &'static [Variant]) -> Self {
        self.repr = Repr::Enumerated(variants);
        self.access = Access::ReadOnly;
        self
    }

    /// Forbids writes through the descriptor.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.access = Access::ReadOnly;
        self
    }

    /// Name of the field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Description of the field, empty when none was given.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        self.description
    }

    /// Bits covered by the field.
    #[must_use]
    pub const fn range(&self) -> FieldRange {
        self.range
    }

    /// Lowest bit of the field.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.range.offset
    }

    /// Number of bits in the field.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.range.width
    }

    /// Presentation of the field.
    #[must_use]
    pub const fn repr(&self) -> Repr {
        self.repr
    }

    /// Access mode of the field.
    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }

    /// Reserved fields, named `reserved*` in any case, document bits that must stay zero. They
    /// are laid out like any other field but excluded from the mask.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.name
            .get(..8)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("reserved"))
    }

    /// Returns `true` for single bit fields.
    #[must_use]
    pub const fn is_flag(&self) -> bool {
        self.range.width == 1
    }
}

/// Value read from a field, carrying the field's presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldValue {
    raw: u128,
    width: u32,
    repr: Repr,
}

impl FieldValue {
    pub(crate) fn new(field: &Field, raw: u128) -> Self {
        Self {
            raw,
            width: field.width(),
            repr: field.repr(),
        }
    }

    /// Raw value, shifted down to bit 0.
    #[must_use]
    pub const fn raw(&self) -> u128 {
        self.raw
    }

    /// Returns `true` if any bit is set.
    #[must_use]
    pub const fn as_bool(&self) -> bool {
        self.raw != 0
    }

    /// Name of the matching variant of an enumerated field.
    #[must_use]
    pub fn variant(&self) -> Option<&'static str> {
        match self.repr {
            Repr::Enumerated(variants) => variants
                .iter()
                .find(|v| v.value == self.raw)
                .map(|v| v.name),
            _ => None,
        }
    }

    /// Converts the raw value into a custom type, e.g. a newtype or a narrower integer.
    ///
    /// # Errors
    ///
    /// When `T::try_from` rejects the value.
    pub fn to<T: TryFrom<u128>>(&self) -> Result<T, T::Error> {
        T::try_from(self.raw)
    }
}

impl From<FieldValue> for u128 {
    fn from(value: FieldValue) -> Self {
        value.raw
    }
}

impl PartialEq<u128> for FieldValue {
    fn eq(&self, other: &u128) -> bool {
        self.raw == *other
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            Repr::Unsigned => write!(f, "{}", self.raw),
            Repr::Flag => write!(f, "{}", self.raw != 0),
            Repr::Hex => {
                let digits = usize::try_from(self.width.div_ceil(4)).unwrap_or(1);
                write!(f, "{:#0w$x}", self.raw, w = digits + 2)
            }
            Repr::Enumerated(_) => match self.variant() {
                Some(name) => write!(f, "{name}"),
                None => write!(f, "{:#x}", self.raw),
            },
        }
    }
}
