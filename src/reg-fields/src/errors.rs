// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::bytes::ValueKind;

/// Error type for reads and writes on registers and structs, and for the conversion primitives
/// in [`crate::bytes`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, displaydoc::Display)]
pub enum RegisterError {
    /// A value of kind `{0}` is not accepted here.
    TypeMismatch(ValueKind),
    /// Value {value} does not fit in a {width} bit range.
    ValueTooWide {
        /// Rejected value.
        value: u128,
        /// Width of the target range in bits.
        width: u32,
    },
    /// Field `{field}` is {width} bits wide, the value needs {required} bits.
    FieldTooWide {
        /// Name of the target field.
        field: &'static str,
        /// Width of the field in bits.
        width: u32,
        /// Number of bits the value needs.
        required: u32,
    },
    /// Value sets reserved bits {0:?}.
    ReservedBitViolation(Vec<u32>),
    /// Value needs {required} bytes, the container holds {capacity} bytes.
    ValueTooLarge {
        /// Number of bytes the value needs.
        required: usize,
        /// Number of bytes the container holds.
        capacity: usize,
    },
    /// Field `{0}` is read-only.
    ImmutableField(&'static str),
    /// Range {start}..{stop} cannot be addressed in a container of {total} units.
    UnsupportedRange {
        /// Inclusive start of the requested range.
        start: u32,
        /// Exclusive stop of the requested range.
        stop: u32,
        /// Number of addressable bits (or bytes for structs) in the container.
        total: u32,
    },
    /// Field `{0}` is not declared in this layout.
    UnknownField(String),
    /// Member `{0}` is not declared in this struct.
    UnknownMember(String),
    /// Register has layout `{found}`, expected `{expected}`.
    LayoutMismatch {
        /// Name of the expected layout.
        expected: &'static str,
        /// Name of the layout the register carries.
        found: &'static str,
    },
}

/// Error type for [`crate::Layout::new`], [`crate::Mask::new`] and [`crate::StructLayout::new`].
///
/// These are declaration errors, the `register!` and `register_struct!` macros report the same
/// conditions at compile time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, displaydoc::Display)]
pub enum LayoutError {
    /// Register size of {0} bytes is outside the supported range of 1 to 16 bytes.
    InvalidSize(usize),
    /// Field `{0}` has zero width.
    ZeroWidth(&'static str),
    /// Field `{name}` ends at bit {end}, past the end of a {total} bit register.
    OutOfBounds {
        /// Name of the field.
        name: &'static str,
        /// Exclusive end bit of the field.
        end: u32,
        /// Width of the register in bits.
        total: u32,
    },
    /// Fields `{0}` and `{1}` overlap.
    Overlapping(&'static str, &'static str),
    /// Name `{0}` is declared more than once.
    Duplicate(&'static str),
    /// Member `{name}` starts at byte {found}, expected byte {expected}.
    NonContiguous {
        /// Name of the member.
        name: &'static str,
        /// Offset where the member should start.
        expected: usize,
        /// Offset the member was declared at.
        found: usize,
    },
    /// Mask of {0} bits is wider than 128 bits.
    MaskTooWide(u32),
}
