// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Do not use this. Use [reg-fields](../reg_fields/index.html).
#![warn(clippy::pedantic)]
#![allow(clippy::items_after_statements)]

use std::ops::Range;

use proc_macro2::{Delimiter, Ident, Span, TokenStream, TokenTree};
use proc_macro_error::abort;

/// Utility functions.
mod utils;
use utils::{parse_rustdoc, RegisterSize};

/// Parsers of member lists.
mod parser;
use parser::{FieldsParser, MembersParser};

/// Code generation.
mod builder;
use builder::{RegisterBuilder, StructBuilder};

/// Error with the span of the offending token.
pub(crate) type ProcError<T> = (Span, T);

/// A named value of an enumerated field, e.g. `NMI = 2`.
#[derive(Debug, Clone)]
pub(crate) struct VariantDecl {
    /// Identifier of the value.
    identifier: Ident,
    /// Encoded value.
    value: u128,
}

/// Presentation requested by field attributes.
#[derive(Debug, Clone, Default)]
pub(crate) enum ReprDecl {
    /// No attribute.
    #[default]
    Unsigned,
    /// `#[hex]`
    Hex,
    /// `#[enumerated(..)]`
    Enumerated(Vec<VariantDecl>),
}

/// A field of a `register!` declaration.
#[derive(Debug, Clone)]
pub(crate) struct FieldDecl {
    /// Bits covered by the field.
    range: Range<u32>,
    /// Rustdoc, used as the field description.
    rustdoc: String,
    /// Identifier of the field.
    identifier: Ident,
    /// Presentation of the field.
    repr: ReprDecl,
    /// `#[read_only]`
    read_only: bool,
}

/// A member of a `register_struct!` declaration.
#[derive(Debug, Clone)]
pub(crate) struct MemberDecl {
    /// Identifier of the member.
    identifier: Ident,
    /// Register type of the member.
    ty: TokenStream,
    /// Byte offset of the member.
    offset: usize,
    /// Rustdoc of the member.
    rustdoc: String,
}

/// Separator between the header and the member group.
const COMMA_ERR: &str = "expected a punctuation comma (',')";

/// Parses the leading `#[doc = ".."]` attributes and the struct identifier of a declaration,
/// returning the rustdoc, the identifier and the remaining tokens.
fn parse_header(tokens: &[TokenTree]) -> (String, Ident, &[TokenTree]) {
    let mut rustdoc = Vec::new();
    let mut rest = tokens;
    loop {
        match rest {
            [TokenTree::Punct(punct), TokenTree::Group(group), tail @ ..]
                if punct.as_char() == '#' && group.delimiter() == Delimiter::Bracket =>
            {
                match parse_rustdoc(group) {
                    Ok(Some(line)) => rustdoc.push(line),
                    Ok(None) => abort!(group, "only rustdoc attributes are accepted on the struct"),
                    Err((span, err)) => abort!(span, "{}", err),
                }
                rest = tail;
            }
            [TokenTree::Ident(ident), tail @ ..] => return (rustdoc.join(" "), ident.clone(), tail),
            [token, ..] => abort!(token, "expected the struct identifier"),
            [] => proc_macro_error::abort_call_site!("expected the struct identifier"),
        }
    }
}

/// Takes the brace delimited member group which ends a declaration, accepting a trailing comma.
fn parse_members_group(tokens: &[TokenTree]) -> &proc_macro2::Group {
    match tokens {
        [TokenTree::Group(group)] | [TokenTree::Group(group), TokenTree::Punct(_)]
            if group.delimiter() == Delimiter::Brace =>
        {
            group
        }
        [TokenTree::Group(group), ..] if group.delimiter() != Delimiter::Brace => abort!(
            group,
            "found group delimiter `{:?}` expected group delimiter `Brace` (`{{ ... }}`)",
            group.delimiter()
        ),
        [token, ..] => abort!(token, "expected a brace delimited group of members"),
        [] => proc_macro_error::abort_call_site!("expected a brace delimited group of members"),
    }
}

/// Declares a register type.
///
/// ```ignore
/// reg_fields::register!(
///     /// Extended feature enables.
///     Ia32Efer, 8, {
///         /// System call extensions.
///         SCE: 0,
///         RESERVED0: 1..8,
///         /// Long mode enable.
///         LME: 8,
///         RESERVED1: 9..10,
///         /// Long mode active.
///         #[read_only]
///         LMA: 10,
///         /// No-execute enable.
///         NXE: 11,
///         RESERVED2: 12..64,
///     }
/// );
/// ```
///
/// - The first token after the rustdoc is the struct identifier, the second the size in bytes
///   (`1..=16`).
/// - Members are `IDENT: bit` flags or `IDENT: start..stop` / `IDENT: start..=last` ranges.
/// - `#[hex]` presents a field in hex, `#[enumerated(NAME = value, ..)]` names its values and
///   makes it read-only, `#[read_only]` forbids writes.
/// - Fields named `RESERVED*` stay out of the write mask.
///
/// Bounds, duplicate identifiers, overlapping fields and enumerated values wider than their field
/// are rejected at compile time.
#[proc_macro_error::proc_macro_error]
#[proc_macro]
pub fn register(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let item = TokenStream::from(input);
    let tokens = item.into_iter().collect::<Vec<_>>();

    let (rustdoc, struct_name, rest) = parse_header(&tokens);

    let (size, rest) = match rest {
        [TokenTree::Punct(comma), TokenTree::Literal(size), tail @ ..] if comma.as_char() == ',' => {
            match RegisterSize::try_from(size) {
                Ok(size) => (size, tail),
                Err((span, err)) => abort!(span, "{}", err),
            }
        }
        [TokenTree::Punct(comma), token, ..] if comma.as_char() == ',' => {
            abort!(token, "2nd argument must be the size in bytes")
        }
        [token, ..] => abort!(token, "{}", COMMA_ERR),
        [] => proc_macro_error::abort_call_site!("{}", COMMA_ERR),
    };
    let rest = match rest {
        [TokenTree::Punct(comma), tail @ ..] if comma.as_char() == ',' => tail,
        [token, ..] => abort!(token, "{}", COMMA_ERR),
        [] => proc_macro_error::abort_call_site!("{}", COMMA_ERR),
    };
    let group = parse_members_group(rest);

    let fields = group.stream().into_iter().collect::<Vec<_>>();
    let builder = FieldsParser::from((size.bits(), fields.iter()))
        .try_fold(RegisterBuilder::new(rustdoc, struct_name, size), |builder, field| {
            field.map(|field| builder.add(field))
        });
    match builder {
        Ok(builder) => proc_macro::TokenStream::from(builder.compose()),
        Err((span, err)) => abort!(span, "{}", err),
    }
}

/// Declares a struct of contiguous registers.
///
/// ```ignore
/// reg_fields::register_struct!(
///     /// Global descriptor table register.
///     Gdtr, {
///         limit: GdtLimit @ 0,
///         base: GdtBase @ 2,
///     }
/// );
/// ```
///
/// Every member names a `register!` type and the byte offset it starts at. The first member
/// starts at 0 and every other member starts where the previous one ends; the latter is asserted
/// at compile time.
#[proc_macro_error::proc_macro_error]
#[proc_macro]
pub fn register_struct(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let item = TokenStream::from(input);
    let tokens = item.into_iter().collect::<Vec<_>>();

    let (rustdoc, struct_name, rest) = parse_header(&tokens);
    let rest = match rest {
        [TokenTree::Punct(comma), tail @ ..] if comma.as_char() == ',' => tail,
        [token, ..] => abort!(token, "{}", COMMA_ERR),
        [] => proc_macro_error::abort_call_site!("{}", COMMA_ERR),
    };
    let group = parse_members_group(rest);

    let members = group.stream().into_iter().collect::<Vec<_>>();
    let builder = MembersParser::from(members.iter())
        .try_fold(StructBuilder::new(rustdoc, struct_name), |builder, member| {
            member.map(|member| builder.add(member))
        });
    match builder {
        Ok(builder) => proc_macro::TokenStream::from(builder.compose()),
        Err((span, err)) => abort!(span, "{}", err),
    }
}
