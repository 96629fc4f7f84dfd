// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::bytes::{self, Value};
use crate::display::indent;
use crate::{Layout, LayoutError, Register, RegisterError, RegisterType};

/// A register placed at a byte offset inside a struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    name: &'static str,
    offset: usize,
    layout: Arc<Layout>,
}

impl Member {
    /// Places a register of `layout` at byte `offset`.
    #[must_use]
    pub fn new(name: &'static str, offset: usize, layout: Arc<Layout>) -> Self {
        Self {
            name,
            offset,
            layout,
        }
    }

    /// Places a register of type `T` at byte `offset`.
    #[must_use]
    pub fn of<T: RegisterType>(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, Arc::clone(T::layout()))
    }

    /// Name of the member.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Byte offset of the member.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Byte width of the member.
    #[must_use]
    pub fn width(&self) -> usize {
        self.layout.size()
    }

    /// Layout of the member.
    #[must_use]
    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// Byte window of the member inside the struct.
    #[must_use]
    pub fn window(&self) -> Range<usize> {
        self.offset..self.offset + self.width()
    }
}

/// Declaration of a struct: byte aligned, contiguous members in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    name: &'static str,
    members: Vec<Member>,
    size: usize,
}

impl StructLayout {
    /// Validates that `members` are contiguous from byte 0 and uniquely named.
    ///
    /// # Errors
    ///
    /// [`LayoutError::NonContiguous`] or [`LayoutError::Duplicate`].
    pub fn new<I>(name: &'static str, members: I) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = Member>,
    {
        let members = members.into_iter().collect::<Vec<_>>();
        let mut names = HashSet::new();
        let mut expected = 0;
        for member in &members {
            if !names.insert(member.name()) {
                return Err(LayoutError::Duplicate(member.name()));
            }
            if member.offset() != expected {
                return Err(LayoutError::NonContiguous {
                    name: member.name(),
                    expected,
                    found: member.offset(),
                });
            }
            expected += member.width();
        }
        Ok(Self::from_checked(name, members))
    }

    /// Builds a struct layout without validating it, used by `register_struct!` which asserts
    /// contiguity at compile time.
    #[doc(hidden)]
    #[must_use]
    pub fn from_checked(name: &'static str, members: Vec<Member>) -> Self {
        let size = members.iter().map(Member::width).sum();
        log::debug!("struct {name}: {size} bytes, {} members", members.len());
        Self {
            name,
            members,
            size,
        }
    }

    /// Name of the struct type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Total size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Members in declaration order.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    fn position(&self, name: &str) -> Result<usize, RegisterError> {
        self.members
            .iter()
            .position(|member| member.name() == name)
            .ok_or_else(|| RegisterError::UnknownMember(String::from(name)))
    }
}

/// A struct type with a statically declared layout, implemented by `register_struct!`.
pub trait StructType: Sized {
    /// Name of the type.
    const NAME: &'static str;

    /// The layout of the type, built on first use and cached for the lifetime of the program.
    fn layout() -> &'static Arc<StructLayout>;

    /// The underlying struct.
    fn as_struct(&self) -> &StructRegister;
}

/// A struct value made of member registers.
///
/// The byte image of the struct is the concatenation of its members' bytes. Whole-struct writes
/// splice the image and re-slice every member from it.
#[derive(Clone, PartialEq, Eq)]
pub struct StructRegister {
    layout: Arc<StructLayout>,
    members: Vec<Register>,
}

impl StructRegister {
    /// Constructs a struct with every member zero.
    #[must_use]
    pub fn zeroed(layout: Arc<StructLayout>) -> Self {
        let members = layout
            .members()
            .iter()
            .map(|member| Register::zeroed(Arc::clone(member.layout())))
            .collect();
        Self { layout, members }
    }

    /// Constructs a struct from an integer, little-endian bytes or a hex string.
    ///
    /// # Errors
    ///
    /// - [`RegisterError::TypeMismatch`] for booleans and text that is not hex.
    /// - [`RegisterError::ValueTooLarge`] when the value is longer than the struct.
    /// - Errors of the member registers, e.g. [`RegisterError::ReservedBitViolation`].
    pub fn new(layout: Arc<StructLayout>, value: impl Into<Value>) -> Result<Self, RegisterError> {
        let mut this = Self::zeroed(layout);
        this.set_value(value)?;
        Ok(this)
    }

    /// Layout of the struct.
    #[must_use]
    pub fn layout(&self) -> &Arc<StructLayout> {
        &self.layout
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Byte image of the struct, members in declaration order.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.members.iter().flat_map(Register::bytes).collect()
    }

    /// The byte image as an integer.
    ///
    /// # Errors
    ///
    /// [`RegisterError::ValueTooLarge`] when the value does not fit in 128 bits.
    pub fn to_int(&self) -> Result<u128, RegisterError> {
        bytes::bytes_to_int(&self.bytes())
    }

    /// Replaces the whole byte image.
    ///
    /// # Errors
    ///
    /// As [`StructRegister::new`].
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<(), RegisterError> {
        let value = value.into();
        if let Value::Bool(_) = value {
            return Err(RegisterError::TypeMismatch(value.kind()));
        }
        let image = bytes::to_bytes(&value, self.size())?;
        if image.len() > self.size() {
            return Err(RegisterError::ValueTooLarge {
                required: image.len(),
                capacity: self.size(),
            });
        }
        self.reslice(&image)
    }

    /// Overwrites `range` of the byte image with `data`, then re-slices every member.
    ///
    /// # Errors
    ///
    /// - [`RegisterError::UnsupportedRange`] when `range` is past the end of the struct or its
    ///   length differs from `data`.
    /// - Errors of the member registers; no member changes in that case.
    pub fn set_bytes(&mut self, range: Range<usize>, data: &[u8]) -> Result<(), RegisterError> {
        if range.start > range.end || range.end > self.size() || range.len() != data.len() {
            return Err(RegisterError::UnsupportedRange {
                start: u32::try_from(range.start).unwrap_or(u32::MAX),
                stop: u32::try_from(range.end).unwrap_or(u32::MAX),
                total: u32::try_from(self.size()).unwrap_or(u32::MAX),
            });
        }
        let mut image = self.bytes();
        image[range].copy_from_slice(data);
        self.reslice(&image)
    }

    /// Member registers in declaration order.
    pub fn members(&self) -> impl Iterator<Item = (&'static str, &Register)> + '_ {
        self.layout
            .members()
            .iter()
            .map(Member::name)
            .zip(self.members.iter())
    }

    /// Looks up a member by name.
    ///
    /// # Errors
    ///
    /// [`RegisterError::UnknownMember`].
    pub fn member(&self, name: &str) -> Result<&Register, RegisterError> {
        let i = self.layout.position(name)?;
        Ok(&self.members[i])
    }

    /// Looks up a member by name for writing. Writes go through the member's own mask.
    ///
    /// # Errors
    ///
    /// [`RegisterError::UnknownMember`].
    pub fn member_mut(&mut self, name: &str) -> Result<&mut Register, RegisterError> {
        let i = self.layout.position(name)?;
        Ok(&mut self.members[i])
    }

    /// Returns a copy of a member as its register type.
    ///
    /// # Errors
    ///
    /// [`RegisterError::UnknownMember`] or [`RegisterError::LayoutMismatch`].
    pub fn member_as<T: RegisterType>(&self, name: &str) -> Result<T, RegisterError> {
        T::from_register(self.member(name)?.clone())
    }

    // Builds every member from `image` before committing any of them.
    fn reslice(&mut self, image: &[u8]) -> Result<(), RegisterError> {
        let members = self
            .layout
            .members()
            .iter()
            .map(|member| {
                let window = image.get(member.window()).unwrap_or_default();
                Register::new(Arc::clone(member.layout()), window)
            })
            .collect::<Result<Vec<_>, _>>()?;
        log::trace!("{}: resliced {} bytes", self.layout.name(), image.len());
        self.members = members;
        Ok(())
    }
}

impl fmt::Debug for StructRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.layout.name());
        for (name, register) in self.members() {
            debug.field(name, register);
        }
        debug.finish()
    }
}

impl fmt::Display for StructRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, register) in self.members() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            writeln!(f, "{name}:")?;
            write!(f, "{}", indent(&register.to_string(), 4))?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for StructRegister {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.members())
    }
}
