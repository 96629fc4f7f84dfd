// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::sync::Arc;

use crate::bytes::MAX_INT_BYTES;
use crate::{Field, LayoutError, Mask, Register, RegisterError};

/// A field as listed in generated tables: `(name, description, offset, width)`.
pub type FieldDescription = (&'static str, &'static str, u32, u32);

/// Aggregated declaration of a register type: its size, its fields in declaration order and
/// the mask derived from them.
///
/// A layout is built once per register type and shared by every instance through an [`Arc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    name: &'static str,
    size: usize,
    fields: Vec<Field>,
    mask: Mask,
}

impl Layout {
    /// Validates the declaration and builds the mask over `8 * size` bits from every
    /// non-reserved field.
    ///
    /// # Errors
    ///
    /// When `size` is not in `1..=16`, or a field is empty, out of bounds, duplicated or overlaps
    /// another field.
    pub fn new<I>(name: &'static str, size: usize, fields: I) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = Field>,
    {
        let fields = fields.into_iter().collect::<Vec<_>>();
        check(size, &fields)?;
        Ok(Self::from_checked(name, size, fields))
    }

    /// Builds a layout from rows of a generated table.
    ///
    /// # Errors
    ///
    /// As [`Layout::new`].
    pub fn from_descriptions(
        name: &'static str,
        size: usize,
        rows: &[FieldDescription],
    ) -> Result<Self, LayoutError> {
        Self::new(
            name,
            size,
            rows.iter()
                .map(|&(field, description, offset, width)| {
                    Field::new(field, offset, width).describe(description)
                }),
        )
    }

    /// A layout without fields whose mask allows every bit, used for untyped containers.
    ///
    /// # Errors
    ///
    /// When `size` is not in `1..=16`.
    pub fn open(name: &'static str, size: usize) -> Result<Self, LayoutError> {
        let total = total_bits(size)?;
        Ok(Self {
            name,
            size,
            fields: Vec::new(),
            mask: Mask::open(total)?,
        })
    }

    /// Builds a layout without validating it.
    ///
    /// Used by `register!`, which performs the checks of [`Layout::new`] at compile time. A layout
    /// built from an invalid declaration does not break memory safety, but reads and writes of
    /// the offending fields are unspecified.
    #[doc(hidden)]
    #[must_use]
    pub fn from_checked(name: &'static str, size: usize, fields: Vec<Field>) -> Self {
        // `size <= 16` for checked declarations.
        #[allow(clippy::cast_possible_truncation)]
        let total = (size * 8) as u32;
        let mask = Mask::from_checked(
            total,
            fields
                .iter()
                .filter(|field| !field.is_reserved())
                .map(Field::range),
        );
        log::debug!("layout {name}: {size} bytes, {} fields, mask {mask}", fields.len());
        Self {
            name,
            size,
            fields,
            mask,
        }
    }

    /// Name of the register type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Size in bits.
    #[must_use]
    pub fn total_bits(&self) -> u32 {
        self.mask.total_bits()
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    /// Mask of bits writable through this layout.
    #[must_use]
    pub const fn mask(&self) -> &Mask {
        &self.mask
    }
}

fn total_bits(size: usize) -> Result<u32, LayoutError> {
    if (1..=MAX_INT_BYTES).contains(&size) {
        // `size <= 16`.
        #[allow(clippy::cast_possible_truncation)]
        Ok((size * 8) as u32)
    } else {
        Err(LayoutError::InvalidSize(size))
    }
}

fn check(size: usize, fields: &[Field]) -> Result<(), LayoutError> {
    let total = total_bits(size)?;
    let mut names = HashSet::new();
    for (i, field) in fields.iter().enumerate() {
        if field.width() == 0 {
            return Err(LayoutError::ZeroWidth(field.name()));
        }
        if field.range().end() > total {
            return Err(LayoutError::OutOfBounds {
                name: field.name(),
                end: field.range().end(),
                total,
            });
        }
        if !names.insert(field.name()) {
            return Err(LayoutError::Duplicate(field.name()));
        }
        if let Some(other) = fields[..i]
            .iter()
            .find(|other| other.range().overlaps(&field.range()))
        {
            return Err(LayoutError::Overlapping(other.name(), field.name()));
        }
    }
    Ok(())
}

/// A register type with a statically declared layout, implemented by `register!`.
pub trait RegisterType: Sized {
    /// Name of the type.
    const NAME: &'static str;
    /// Size in bytes.
    const SIZE: usize;
    /// Fields in declaration order.
    const FIELDS: &'static [Field];

    /// The layout of the type, built on first use and cached for the lifetime of the program.
    fn layout() -> &'static Arc<Layout>;

    /// Wraps a register without checking its layout.
    #[doc(hidden)]
    fn wrap(register: Register) -> Self;

    /// The underlying register.
    fn as_register(&self) -> &Register;

    /// Wraps `register` if it carries this type's layout.
    ///
    /// # Errors
    ///
    /// [`RegisterError::LayoutMismatch`] when `register` was built from another layout.
    fn from_register(register: Register) -> Result<Self, RegisterError> {
        if Arc::ptr_eq(register.layout(), Self::layout()) {
            Ok(Self::wrap(register))
        } else {
            Err(RegisterError::LayoutMismatch {
                expected: Self::NAME,
                found: register.layout().name(),
            })
        }
    }
}
