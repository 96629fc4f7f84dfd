// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::num::ParseIntError;
use std::ops::RangeInclusive;
use std::str::FromStr;

use convert_case::{Case, Casing};
use proc_macro2::{Group, Ident, Literal, TokenTree};

/// Valid register sizes in bytes.
const SIZES: RangeInclusive<usize> = 1..=16;

/// Size of a register in bytes, restricted to `1..=16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegisterSize(usize);

impl RegisterSize {
    /// Returns the size in bytes.
    pub(crate) const fn bytes(self) -> usize {
        self.0
    }

    /// Returns the size in bits.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn bits(self) -> u32 {
        // At most 128.
        (self.0 * 8) as u32
    }
}

/// Error type for [`<RegisterSize as TryFrom<&Literal>>::try_from`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum RegisterSizeError {
    /// Failed to parse token.
    #[error("Failed to parse token for register size: {0}")]
    Parse(ParseIntError),
    /// Size outside of valid range.
    #[error("Register size ({0}) outside of valid range (1..=16). Sizes are in bytes.")]
    Invalid(usize),
}

impl TryFrom<&Literal> for RegisterSize {
    type Error = crate::ProcError<RegisterSizeError>;
    fn try_from(literal: &Literal) -> Result<Self, Self::Error> {
        match parse_int::<usize>(literal) {
            Ok(size) if SIZES.contains(&size) => Ok(Self(size)),
            Ok(size) => Err((literal.span(), RegisterSizeError::Invalid(size))),
            Err(err) => Err((literal.span(), RegisterSizeError::Parse(err))),
        }
    }
}

/// Parses an unsuffixed integer literal, decimal or `0x` prefixed hex, with optional `_`
/// separators.
pub(crate) fn parse_int<T>(literal: &Literal) -> Result<T, ParseIntError>
where
    T: FromStr<Err = ParseIntError> + FromStrRadix,
{
    let text = literal.to_string().replace('_', "");
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => T::from_str_radix(hex, 16),
        None => T::from_str(&text),
    }
}

/// Integers which can be parsed in a given radix.
pub(crate) trait FromStrRadix: Sized {
    /// See `u32::from_str_radix`.
    fn from_str_radix(src: &str, radix: u32) -> Result<Self, ParseIntError>;
}

macro_rules! from_str_radix {
    ($($x:ty),*) => {
        $(
            impl FromStrRadix for $x {
                fn from_str_radix(src: &str, radix: u32) -> Result<Self, ParseIntError> {
                    <$x>::from_str_radix(src, radix)
                }
            }
        )*
    };
}
from_str_radix!(u32, u128, usize);

/// Error type for [`parse_rustdoc`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum RustdocError {
    /// Rustdoc comment missing enclosing " characters.
    #[error("Rustdoc comment missing enclosing \" characters.")]
    Unenclosed,
}

/// Reads the text of a `#[doc = ".."]` attribute from its bracket group, `None` for any other
/// attribute.
pub(crate) fn parse_rustdoc(
    group: &Group,
) -> Result<Option<String>, crate::ProcError<RustdocError>> {
    let tokens = group.stream().into_iter().collect::<Vec<_>>();
    match tokens.as_slice() {
        [TokenTree::Ident(ident), TokenTree::Punct(punct), TokenTree::Literal(literal)]
            if *ident == "doc" && punct.as_char() == '=' =>
        {
            // From `"some comment"` we are getting `some comment`.
            let text = literal.to_string();
            let mut chars = text.chars();
            if let (Some('"'), Some('"')) = (chars.next(), chars.next_back()) {
                // A comment like `/// abcde` arrives as `" abcde"`.
                Ok(Some(String::from(chars.as_str().trim())))
            } else {
                Err((literal.span(), RustdocError::Unenclosed))
            }
        }
        _ => Ok(None),
    }
}

/// Identifier of the associated constant generated for a member, in upper snake case.
///
/// Identifiers without lowercase letters are kept as written, so `IA32_EFER` does not become
/// `IA_32_EFER`.
pub(crate) fn const_ident(ident: &Ident) -> Ident {
    let text = ident.to_string();
    if text.chars().any(char::is_lowercase) {
        Ident::new(&text.to_case(Case::UpperSnake), ident.span())
    } else {
        ident.clone()
    }
}

#[cfg(test)]
mod tests {
    use proc_macro2::{Delimiter, Span};

    use super::*;

    fn call_site_ident(s: &str) -> Ident {
        Ident::new(s, Span::call_site())
    }

    #[test]
    fn register_size_try_from() {
        let size = RegisterSize::try_from(&Literal::usize_unsuffixed(8)).unwrap();
        assert_eq!(size.bytes(), 8);
        assert_eq!(size.bits(), 64);
        assert_eq!(
            RegisterSize::try_from(&Literal::usize_unsuffixed(16))
                .unwrap()
                .bits(),
            128
        );
        assert!(matches!(
            RegisterSize::try_from(&Literal::usize_unsuffixed(0)),
            Err((_, RegisterSizeError::Invalid(0)))
        ));
        assert!(matches!(
            RegisterSize::try_from(&Literal::usize_unsuffixed(17)),
            Err((_, RegisterSizeError::Invalid(17)))
        ));
        assert!(matches!(
            RegisterSize::try_from(&Literal::usize_suffixed(4)),
            Err((_, RegisterSizeError::Parse(_)))
        ));
    }

    #[test]
    fn register_size_error_display() {
        assert_eq!(
            RegisterSizeError::Invalid(20).to_string(),
            "Register size (20) outside of valid range (1..=16). Sizes are in bytes."
        );
    }

    #[test]
    fn parse_int_radix() {
        assert_eq!(parse_int::<u32>(&Literal::u32_unsuffixed(12)), Ok(12));
        assert_eq!(
            parse_int::<u128>(&Literal::from_str("0x1F").unwrap()),
            Ok(0x1f)
        );
        assert_eq!(
            parse_int::<u128>(&Literal::from_str("1_000").unwrap()),
            Ok(1000)
        );
        assert!(parse_int::<u32>(&Literal::u32_suffixed(3)).is_err());
        assert!(parse_int::<u32>(&Literal::string("3")).is_err());
    }

    #[test]
    fn rustdoc() {
        let group = Group::new(Delimiter::Bracket, quote::quote! { doc = " some docs" });
        assert!(matches!(parse_rustdoc(&group), Ok(Some(doc)) if doc == "some docs"));

        let group = Group::new(Delimiter::Bracket, quote::quote! { hex });
        assert!(matches!(parse_rustdoc(&group), Ok(None)));

        let group = Group::new(Delimiter::Bracket, quote::quote! { doc = 3 });
        assert!(matches!(
            parse_rustdoc(&group),
            Err((_, RustdocError::Unenclosed))
        ));
    }

    #[test]
    fn const_idents() {
        assert_eq!(const_ident(&call_site_ident("LME")), "LME");
        assert_eq!(const_ident(&call_site_ident("IA32_EFER")), "IA32_EFER");
        assert_eq!(const_ident(&call_site_ident("RESERVED0")), "RESERVED0");
        assert_eq!(const_ident(&call_site_ident("pageSize")), "PAGE_SIZE");
        assert_eq!(const_ident(&call_site_ident("page_size")), "PAGE_SIZE");
    }
}
