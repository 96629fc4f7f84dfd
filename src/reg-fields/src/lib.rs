// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Declarative bit-level register layouts.
//!
//! A register is a fixed size unsigned value (1 to 16 bytes) divided into named fields. Layouts
//! are declared once, either at compile time with [`register!`] or at runtime with
//! [`Layout::new`], and every write is checked against the layout's mask so reserved bits stay
//! zero. Registers can be grouped into byte contiguous structs with [`register_struct!`].
//!
//! Originally designed to inspect CPU registers, MSRs and VMCS fields.
//!
//! See [`example::Ia32Efer`] and [`example::Gdtr`] for generated types.
//!
//! ## Features
//! - `serde`: `Serialize` implementations producing the field map of a register and the member
//!   map of a struct.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Generated code refers to this crate by name.
extern crate self as reg_fields;

/// Conversions between integers, bytes and hex text.
pub mod bytes;
mod display;
mod errors;
mod field;
mod layout;
mod mask;
mod register;
mod structure;

#[cfg(any(doc, test))]
pub mod example;

pub use bytes::{Value, ValueKind};
pub use errors::{LayoutError, RegisterError};
pub use field::{Access, Field, FieldValue, Repr, Variant};
pub use layout::{FieldDescription, Layout, RegisterType};
pub use mask::{FieldRange, Mask};
pub use reg_fields_macros::{register, register_struct};
pub use register::Register;
pub use structure::{Member, StructLayout, StructRegister, StructType};
