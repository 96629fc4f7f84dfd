// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashSet;
use std::num::ParseIntError;
use std::ops::{Range, RangeInclusive};

use proc_macro2::{Delimiter, Group, Ident, Literal, Span, TokenStream, TokenTree};

use crate::utils::{const_ident, parse_int, parse_rustdoc, RustdocError};
use crate::{FieldDecl, MemberDecl, ReprDecl, VariantDecl};

/// Attributes collected ahead of the next field.
#[derive(Debug, Default)]
struct Attributes {
    /// Rustdoc lines.
    rustdoc: Vec<String>,
    /// Presentation.
    repr: ReprDecl,
    /// `#[read_only]`
    read_only: bool,
}

/// Parses a slice of tokens into an iterator of register fields.
pub(crate) struct FieldsParser<'a> {
    /// Token slice iterator.
    iter: std::slice::Iter<'a, TokenTree>,
    /// Constant identifiers already used.
    existing: HashSet<String>,
    /// Attributes of the next field.
    attributes: Attributes,
    /// Number of bits in the register.
    size: u32,
    /// Error flag we set when encountering an error.
    error: bool,
    /// Bits already covered by a field. Fields cannot overlap, reserved ones included.
    used_bits: Vec<bool>,
}

impl<'a> From<(u32, std::slice::Iter<'a, TokenTree>)> for FieldsParser<'a> {
    fn from((size, iter): (u32, std::slice::Iter<'a, TokenTree>)) -> Self {
        Self {
            iter,
            existing: HashSet::new(),
            attributes: Attributes::default(),
            size,
            error: false,
            used_bits: vec![false; usize::try_from(size).unwrap_or_default()],
        }
    }
}

/// Error type for [`<FieldsParser<'_> as std::iter::Iterator>::next`].
#[derive(Debug, thiserror::Error)]
pub(crate) enum FieldsParserError {
    /// Identifier already used.
    #[error("Identifier already used: `{0}`.")]
    DuplicateIdentifier(String),
    /// Failed to get field indices.
    #[error("Failed to get field indices: {0}")]
    IndexField(IndexFieldError),
    /// Failed to get flag index.
    #[error("Failed to get flag index: {0}")]
    IndexFlag(IndexFlagError),
    /// Unknown attribute supplied on field.
    #[error(
        "Unknown attribute supplied on field. Supported attributes are `#[hex]`, \
         `#[read_only]`, `#[enumerated(NAME = value, ..)]` and `#[doc=\"..\"]`."
    )]
    UnknownAttribute,
    /// Malformed rustdoc.
    #[error("{0}")]
    Rustdoc(RustdocError),
    /// Badly defined fields.
    #[error("Badly defined fields: {0:?}.")]
    BadlyDefinedFields(Vec<String>),
    /// Expected comma.
    #[error("Expected comma.")]
    ExpectedComma,
    /// Field overlaps a previous field.
    #[error("Field `{0}` overlaps a previous field.")]
    Overlapping(String),
    /// Malformed enumerated values.
    #[error("Malformed enumerated values, expected `#[enumerated(NAME = value, ..)]`.")]
    MalformedVariants,
    /// Enumerated value does not fit in the field.
    #[error("Enumerated value `{name}` ({value}) does not fit in the {width} bits of the field.")]
    VariantTooWide {
        /// Name of the value.
        name: String,
        /// Value.
        value: u128,
        /// Width of the field.
        width: u32,
    },
    /// Enumerated value name already used.
    #[error("Enumerated value name already used: `{0}`.")]
    DuplicateVariant(String),
}

/// Advances parser iterator expecting `base+1`th token to be `None` or a comma.
fn advance_iter<E>(
    iter: &mut std::slice::Iter<'_, TokenTree>,
    tail: &[TokenTree],
    base: usize,
    expected_comma: E,
) -> Result<(), crate::ProcError<E>> {
    // Move past this identified slice.
    iter.nth(base);
    match tail.first() {
        // If no tailing comma, we also we expect this to be end.
        None => Ok(()),
        Some(TokenTree::Punct(comma)) if comma.as_char() == ',' => {
            iter.next();
            Ok(())
        }
        Some(token) => Err((token.span(), expected_comma)),
    }
}

impl FieldsParser<'_> {
    /// Builds the next field from the collected attributes.
    fn field(
        &mut self,
        ident: &Ident,
        range: Range<u32>,
        span: Span,
    ) -> Result<FieldDecl, crate::ProcError<FieldsParserError>> {
        // Check identifier not already used, after conversion to a constant identifier.
        if !self.existing.insert(const_ident(ident).to_string()) {
            return Err((
                ident.span(),
                FieldsParserError::DuplicateIdentifier(ident.to_string()),
            ));
        }

        // `used_bits` has a length of `self.size` and `range` lies within `0..self.size`.
        #[allow(clippy::indexing_slicing)]
        for bit in &mut self.used_bits[usize_from(range.start)..usize_from(range.end)] {
            if *bit {
                return Err((span, FieldsParserError::Overlapping(ident.to_string())));
            }
            *bit = true;
        }

        let Attributes {
            rustdoc,
            repr,
            read_only,
        } = std::mem::take(&mut self.attributes);
        let width = range.end - range.start;
        if let ReprDecl::Enumerated(variants) = &repr {
            if let Some(variant) = variants
                .iter()
                .find(|variant| u128::BITS - variant.value.leading_zeros() > width)
            {
                return Err((
                    variant.identifier.span(),
                    FieldsParserError::VariantTooWide {
                        name: variant.identifier.to_string(),
                        value: variant.value,
                        width,
                    },
                ));
            }
        }

        Ok(FieldDecl {
            range,
            rustdoc: rustdoc.join(" "),
            identifier: ident.clone(),
            repr,
            read_only,
        })
    }

    /// Collects a field attribute from its bracket group.
    fn attribute(&mut self, group: &Group) -> Result<(), crate::ProcError<FieldsParserError>> {
        if let Some(line) = parse_rustdoc(group)
            .map_err(|(span, err)| (span, FieldsParserError::Rustdoc(err)))?
        {
            self.attributes.rustdoc.push(line);
            return Ok(());
        }
        let tokens = group.stream().into_iter().collect::<Vec<_>>();
        match tokens.as_slice() {
            [TokenTree::Ident(ident)] if *ident == "hex" => self.attributes.repr = ReprDecl::Hex,
            [TokenTree::Ident(ident)] if *ident == "read_only" => self.attributes.read_only = true,
            [TokenTree::Ident(ident), TokenTree::Group(values)]
                if *ident == "enumerated" && values.delimiter() == Delimiter::Parenthesis =>
            {
                let variants = parse_variants(values)?;
                self.attributes.repr = ReprDecl::Enumerated(variants);
            }
            _ => return Err((group.span(), FieldsParserError::UnknownAttribute)),
        }
        Ok(())
    }

    /// Wraps the result of a field, setting the error flag on failure.
    fn emit(
        &mut self,
        result: Result<FieldDecl, crate::ProcError<FieldsParserError>>,
    ) -> Option<<Self as Iterator>::Item> {
        self.error = result.is_err();
        Some(result)
    }
}

impl Iterator for FieldsParser<'_> {
    type Item = Result<FieldDecl, crate::ProcError<FieldsParserError>>;
    fn next(&mut self) -> Option<Self::Item> {
        // After the iterator yields `Some(Err(_))` it always yields `None`.
        if self.error {
            return None;
        }
        // This loop is required to collect attributes.
        loop {
            match self.iter.as_slice() {
                // Inclusive bit range: e.g. "ADDR: 12..=51"
                [TokenTree::Ident(ident), TokenTree::Punct(colon), TokenTree::Literal(start_token), TokenTree::Punct(d1), TokenTree::Punct(d2), TokenTree::Punct(eq), TokenTree::Literal(last_token), end @ ..]
                    if colon.as_char() == ':'
                        && d1.as_char() == '.'
                        && d2.as_char() == '.'
                        && eq.as_char() == '=' =>
                {
                    let result =
                        advance_iter(&mut self.iter, end, 6, FieldsParserError::ExpectedComma)
                            .and_then(|()| {
                                index_field(start_token, last_token, true, 0..self.size).map_err(
                                    |(span, err)| (span, FieldsParserError::IndexField(err)),
                                )
                            })
                            .and_then(|range| self.field(ident, range, start_token.span()));
                    return self.emit(result);
                }
                // Bit range: e.g. "RANGE: 0..2"
                [TokenTree::Ident(ident), TokenTree::Punct(colon), TokenTree::Literal(start_token), TokenTree::Punct(d1), TokenTree::Punct(d2), TokenTree::Literal(stop_token), end @ ..]
                    if colon.as_char() == ':' && d1.as_char() == '.' && d2.as_char() == '.' =>
                {
                    let result =
                        advance_iter(&mut self.iter, end, 5, FieldsParserError::ExpectedComma)
                            .and_then(|()| {
                                index_field(start_token, stop_token, false, 0..self.size).map_err(
                                    |(span, err)| (span, FieldsParserError::IndexField(err)),
                                )
                            })
                            .and_then(|range| self.field(ident, range, start_token.span()));
                    return self.emit(result);
                }
                // Bit flag: e.g. "FLAG: 3"
                [TokenTree::Ident(ident), TokenTree::Punct(colon), TokenTree::Literal(index_token), end @ ..]
                    if colon.as_char() == ':' =>
                {
                    let result =
                        advance_iter(&mut self.iter, end, 2, FieldsParserError::ExpectedComma)
                            .and_then(|()| {
                                index_flag(index_token, 0..self.size).map_err(|(span, err)| {
                                    (span, FieldsParserError::IndexFlag(err))
                                })
                            })
                            .and_then(|index| {
                                self.field(ident, index..index + 1, index_token.span())
                            });
                    return self.emit(result);
                }
                // Attribute: e.g. `#[hex]` or `#[doc=".."]`
                [TokenTree::Punct(punct), TokenTree::Group(group), ..]
                    if punct.as_char() == '#' && group.delimiter() == Delimiter::Bracket =>
                {
                    // Move past this identified slice.
                    self.iter.nth(1);
                    if let Err(err) = self.attribute(group) {
                        self.error = true;
                        return Some(Err(err));
                    }
                }
                // On an exhausted iterator return none.
                [] => return None,
                _ => {
                    self.error = true;
                    return Some(Err((
                        Span::call_site(),
                        FieldsParserError::BadlyDefinedFields(
                            self.iter
                                .clone()
                                .map(std::string::ToString::to_string)
                                .collect::<Vec<_>>(),
                        ),
                    )));
                }
            }
        }
    }
}

/// Parses `NAME = value, ..` inside `#[enumerated(..)]`.
fn parse_variants(group: &Group) -> Result<Vec<VariantDecl>, crate::ProcError<FieldsParserError>> {
    let tokens = group.stream().into_iter().collect::<Vec<_>>();
    let mut rest = tokens.as_slice();
    let mut names = HashSet::new();
    let mut variants = Vec::new();
    loop {
        match rest {
            [TokenTree::Ident(ident), TokenTree::Punct(eq), TokenTree::Literal(value), tail @ ..]
                if eq.as_char() == '=' =>
            {
                let value = parse_int::<u128>(value)
                    .map_err(|_| (value.span(), FieldsParserError::MalformedVariants))?;
                if !names.insert(ident.to_string()) {
                    return Err((
                        ident.span(),
                        FieldsParserError::DuplicateVariant(ident.to_string()),
                    ));
                }
                variants.push(VariantDecl {
                    identifier: ident.clone(),
                    value,
                });
                rest = match tail {
                    [TokenTree::Punct(comma), tail @ ..] if comma.as_char() == ',' => tail,
                    [] => tail,
                    [token, ..] => return Err((token.span(), FieldsParserError::ExpectedComma)),
                };
            }
            [] if !variants.is_empty() => return Ok(variants),
            _ => return Err((group.span(), FieldsParserError::MalformedVariants)),
        }
    }
}

/// Parses a slice of tokens into an iterator of struct members.
pub(crate) struct MembersParser<'a> {
    /// Token slice iterator.
    iter: std::slice::Iter<'a, TokenTree>,
    /// Member identifiers already used.
    existing: HashSet<String>,
    /// Rustdoc of the next member.
    rustdoc: Vec<String>,
    /// Offset of the previous member, `None` before the first member.
    previous: Option<usize>,
    /// Error flag we set when encountering an error.
    error: bool,
}

impl<'a> From<std::slice::Iter<'a, TokenTree>> for MembersParser<'a> {
    fn from(iter: std::slice::Iter<'a, TokenTree>) -> Self {
        Self {
            iter,
            existing: HashSet::new(),
            rustdoc: Vec::new(),
            previous: None,
            error: false,
        }
    }
}

/// Error type for [`<MembersParser<'_> as std::iter::Iterator>::next`].
#[derive(Debug, thiserror::Error)]
pub(crate) enum MembersParserError {
    /// Identifier already used.
    #[error("Identifier already used: `{0}`.")]
    DuplicateIdentifier(String),
    /// Failed to parse token for offset.
    #[error("Failed to parse token for offset: {0}")]
    ParseOffset(ParseIntError),
    /// First member does not start at byte 0.
    #[error("The first member must start at byte 0, found {0}.")]
    FirstOffset(usize),
    /// Members out of order.
    #[error("Members must be declared in order of offset, {found} follows {previous}.")]
    Unordered {
        /// Offset of the previous member.
        previous: usize,
        /// Offset of this member.
        found: usize,
    },
    /// Missing member type.
    #[error("Expected a register type between `:` and `@`.")]
    MissingType,
    /// Unknown attribute supplied on member.
    #[error("Unknown attribute supplied on member. Only `#[doc=\"..\"]` is supported.")]
    UnknownAttribute,
    /// Malformed rustdoc.
    #[error("{0}")]
    Rustdoc(RustdocError),
    /// Badly defined members.
    #[error("Badly defined members: {0:?}. Expected `name: Type @ offset`.")]
    BadlyDefinedMembers(Vec<String>),
    /// Expected comma.
    #[error("Expected comma.")]
    ExpectedComma,
}

impl MembersParser<'_> {
    /// Checks the identifier and offset of the next member.
    fn member(
        &mut self,
        ident: &Ident,
        ty: &[TokenTree],
        offset_token: &Literal,
    ) -> Result<MemberDecl, crate::ProcError<MembersParserError>> {
        if ty.is_empty() {
            return Err((ident.span(), MembersParserError::MissingType));
        }
        if !self.existing.insert(ident.to_string()) {
            return Err((
                ident.span(),
                MembersParserError::DuplicateIdentifier(ident.to_string()),
            ));
        }
        let offset = parse_int::<usize>(offset_token)
            .map_err(|err| (offset_token.span(), MembersParserError::ParseOffset(err)))?;
        match self.previous {
            None if offset != 0 => {
                return Err((offset_token.span(), MembersParserError::FirstOffset(offset)))
            }
            Some(previous) if offset <= previous => {
                return Err((
                    offset_token.span(),
                    MembersParserError::Unordered {
                        previous,
                        found: offset,
                    },
                ))
            }
            _ => {}
        }
        self.previous = Some(offset);
        Ok(MemberDecl {
            identifier: ident.clone(),
            ty: ty.iter().cloned().collect::<TokenStream>(),
            offset,
            rustdoc: std::mem::take(&mut self.rustdoc).join(" "),
        })
    }
}

impl Iterator for MembersParser<'_> {
    type Item = Result<MemberDecl, crate::ProcError<MembersParserError>>;
    fn next(&mut self) -> Option<Self::Item> {
        // After the iterator yields `Some(Err(_))` it always yields `None`.
        if self.error {
            return None;
        }
        loop {
            match self.iter.as_slice() {
                // Member: e.g. "base: GdtBase @ 2"
                [TokenTree::Ident(ident), TokenTree::Punct(colon), rest @ ..]
                    if colon.as_char() == ':'
                        && rest.iter().any(|token| {
                            matches!(token, TokenTree::Punct(at) if at.as_char() == '@')
                        }) =>
                {
                    // `rest` contains an `@`.
                    let at = rest
                        .iter()
                        .position(|token| matches!(token, TokenTree::Punct(at) if at.as_char() == '@'))
                        .unwrap_or_default();
                    let (ty, tail) = rest.split_at(at);
                    let result = match tail {
                        [_, TokenTree::Literal(offset_token), end @ ..] => advance_iter(
                            &mut self.iter,
                            end,
                            at + 3,
                            MembersParserError::ExpectedComma,
                        )
                        .and_then(|()| self.member(ident, ty, offset_token)),
                        [at_token, ..] => Err((
                            at_token.span(),
                            MembersParserError::BadlyDefinedMembers(
                                rest.iter().map(ToString::to_string).collect(),
                            ),
                        )),
                        [] => Err((Span::call_site(), MembersParserError::MissingType)),
                    };
                    self.error = result.is_err();
                    return Some(result);
                }
                // Attribute: e.g. `#[doc=".."]`
                [TokenTree::Punct(punct), TokenTree::Group(group), ..]
                    if punct.as_char() == '#' && group.delimiter() == Delimiter::Bracket =>
                {
                    self.iter.nth(1);
                    match parse_rustdoc(group) {
                        Ok(Some(line)) => self.rustdoc.push(line),
                        Ok(None) => {
                            self.error = true;
                            return Some(Err((group.span(), MembersParserError::UnknownAttribute)));
                        }
                        Err((span, err)) => {
                            self.error = true;
                            return Some(Err((span, MembersParserError::Rustdoc(err))));
                        }
                    }
                }
                [] => return None,
                _ => {
                    self.error = true;
                    return Some(Err((
                        Span::call_site(),
                        MembersParserError::BadlyDefinedMembers(
                            self.iter
                                .clone()
                                .map(std::string::ToString::to_string)
                                .collect::<Vec<_>>(),
                        ),
                    )));
                }
            }
        }
    }
}

/// `u32` to `usize`, lossless on every supported target.
fn usize_from(x: u32) -> usize {
    usize::try_from(x).unwrap_or(usize::MAX)
}

/// Error type for [`index_field`].
#[derive(Debug, thiserror::Error)]
pub(crate) enum IndexFieldError {
    /// Failed to parse token for start index.
    #[error("Failed to parse token for start index: {0}")]
    ParseStart(ParseIntError),
    /// Start index outside of valid range.
    #[error("Start index ({start}) outside of valid range ({valid_range:?}).")]
    InvalidStart {
        /// Parsed start index.
        start: u32,
        /// Valid range that `start` lies outside of.
        valid_range: Range<u32>,
    },
    /// Failed to parse token for stop index.
    #[error("Failed to parse token for stop index: {0}")]
    ParseStop(ParseIntError),
    /// Stop index outside of valid range.
    #[error("Stop index ({stop}) outside of valid range ({valid_range:?}).")]
    InvalidStop {
        /// Parsed stop index.
        stop: u32,
        /// Valid range that `stop` lies outside of.
        valid_range: RangeInclusive<u32>,
    },
}

/// For field indices, checks the start is within the register and the stop is past the start
/// and within the register, then returns them as an exclusive range. An inclusive `last` index is
/// converted to an exclusive stop.
#[allow(clippy::arithmetic_side_effects)]
fn index_field(
    start_token: &Literal,
    stop_token: &Literal,
    inclusive: bool,
    valid_range: Range<u32>,
) -> Result<Range<u32>, crate::ProcError<IndexFieldError>> {
    let start = match parse_int::<u32>(start_token) {
        Ok(s) if valid_range.contains(&s) => Ok(s),
        Ok(s) => Err((
            start_token.span(),
            IndexFieldError::InvalidStart {
                start: s,
                valid_range: valid_range.clone(),
            },
        )),
        Err(err) => Err((start_token.span(), IndexFieldError::ParseStart(err))),
    }?;
    // `start < valid_range.end <= 128`, so neither bound overflows.
    let (first, last) = if inclusive {
        (start, valid_range.end - 1)
    } else {
        (start + 1, valid_range.end)
    };
    let stop = match parse_int::<u32>(stop_token) {
        Ok(s) if (first..=last).contains(&s) => Ok(if inclusive { s + 1 } else { s }),
        Ok(s) => Err((
            stop_token.span(),
            IndexFieldError::InvalidStop {
                stop: s,
                valid_range: first..=last,
            },
        )),
        Err(err) => Err((stop_token.span(), IndexFieldError::ParseStop(err))),
    }?;

    Ok(start..stop)
}

/// Error type for [`index_flag`].
#[derive(Debug, thiserror::Error)]
pub(crate) enum IndexFlagError {
    /// Failed to parse token for index.
    #[error("Failed to parse token for index: {0}")]
    Parse(ParseIntError),
    /// Index outside of valid range.
    #[error("Index ({index}) outside valid range ({valid_range:?}).")]
    Invalid {
        /// Parsed index.
        index: u32,
        /// Valid range that `index` lies outside of.
        valid_range: Range<u32>,
    },
}

/// For a bit flag index, checks if it is within the register, then returns it.
fn index_flag(index: &Literal, valid_range: Range<u32>) -> Result<u32, crate::ProcError<IndexFlagError>> {
    match parse_int::<u32>(index) {
        Ok(s) if valid_range.contains(&s) => Ok(s),
        Ok(s) => Err((
            index.span(),
            IndexFlagError::Invalid {
                index: s,
                valid_range,
            },
        )),
        Err(err) => Err((index.span(), IndexFlagError::Parse(err))),
    }
}
