// Copyright 2022 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use proc_macro2::{Ident, Literal, TokenStream};
use quote::quote;

use crate::utils::{const_ident, RegisterSize};
use crate::{FieldDecl, MemberDecl, ReprDecl};

/// Builds the rustdoc attribute for `rustdoc`, nothing when it is empty.
///
/// We check if the rustdoc string is empty to avoid adding an empty doc comment
/// (e.g. `#[doc=""]`) which would suppress lint warnings.
fn rustdoc_stream(rustdoc: &str) -> TokenStream {
    if rustdoc.is_empty() {
        TokenStream::new()
    } else {
        quote! { #[doc=#rustdoc] }
    }
}

/// Builder for register types.
#[derive(Debug)]
pub struct RegisterBuilder {
    /// Associated `Field` constants.
    field_constants: TokenStream,
    /// Paths of the field constants in declaration order, used for `FIELDS`.
    field_list: TokenStream,
    /// Rows of the table used in the rustdoc for the register.
    struct_doc_table_layout: Vec<TokenStream>,
    /// Rustdoc to attach to the generated register.
    rustdoc: String,
    /// Struct identifier.
    struct_name: Ident,
    /// Size of the register.
    size: RegisterSize,
}

impl RegisterBuilder {
    /// Constructs new `RegisterBuilder`.
    pub fn new(rustdoc: String, struct_name: Ident, size: RegisterSize) -> Self {
        Self {
            field_constants: TokenStream::new(),
            field_list: TokenStream::new(),
            struct_doc_table_layout: vec![quote! {
                #[doc = "<tr><th>Bit/s</th><th>Identifier</th><th>Description</th></tr>"]
            }],
            rustdoc,
            struct_name,
            size,
        }
    }

    /// Adds a field to the register.
    pub(crate) fn add(
        mut self,
        FieldDecl {
            range,
            rustdoc,
            identifier,
            repr,
            read_only,
        }: FieldDecl,
    ) -> Self {
        let identifier_str = identifier.to_string();
        let constant = const_ident(&identifier);
        let rustdoc_stream = rustdoc_stream(&rustdoc);
        let offset = Literal::u32_unsuffixed(range.start);
        let width = Literal::u32_unsuffixed(range.end - range.start);

        // Field constant
        // ------------------------
        let describe = if rustdoc.is_empty() {
            TokenStream::new()
        } else {
            quote! { .describe(#rustdoc) }
        };
        let repr = match repr {
            ReprDecl::Unsigned => TokenStream::new(),
            ReprDecl::Hex => quote! { .hex() },
            ReprDecl::Enumerated(variants) => {
                let variants = variants.iter().map(|variant| {
                    let name = variant.identifier.to_string();
                    let value = Literal::u128_unsuffixed(variant.value);
                    quote! { reg_fields::Variant { name: #name, value: #value } }
                });
                quote! { .enumerated(&[#(#variants),*]) }
            }
        };
        let access = if read_only {
            quote! { .read_only() }
        } else {
            TokenStream::new()
        };
        self.field_constants.extend(quote! {
            #rustdoc_stream
            pub const #constant: reg_fields::Field =
                reg_fields::Field::new(#identifier_str, #offset, #width) #describe #repr #access;
        });
        self.field_list.extend(quote! { Self::#constant, });

        // Struct rustdoc table
        // ------------------------
        let bits = if range.end - range.start == 1 {
            format!("{:02}", range.start)
        } else {
            format!("{:02}..{:02}", range.start, range.end)
        };
        let rustdoc_string = format!("<tr><td>{bits}</td><td>{identifier_str}</td><td>{rustdoc}</td></tr>");
        self.struct_doc_table_layout.push(quote! {
            #[doc=#rustdoc_string]
        });

        self
    }

    /// Composes `self` into a `TokenStream`.
    #[allow(clippy::too_many_lines)]
    pub fn compose(self) -> TokenStream {
        let RegisterBuilder {
            field_constants,
            field_list,
            struct_doc_table_layout,
            rustdoc,
            struct_name,
            size,
        } = self;
        let name = struct_name.to_string();
        let size = Literal::usize_unsuffixed(size.bytes());
        let rustdoc_stream = rustdoc_stream(&rustdoc);

        quote! {
            #rustdoc_stream
            #[doc = "<table>"]
            #(#struct_doc_table_layout)*
            #[doc = "</table>"]
            #[derive(Clone, PartialEq, Eq)]
            pub struct #struct_name(reg_fields::Register);

            impl #struct_name {
                #field_constants

                /// Constructs a register from an integer or little-endian bytes.
                ///
                /// # Errors
                ///
                /// See [`reg_fields::Register::new`].
                pub fn new(
                    value: impl Into<reg_fields::Value>,
                ) -> Result<Self, reg_fields::RegisterError> {
                    reg_fields::Register::new(
                        std::sync::Arc::clone(<Self as reg_fields::RegisterType>::layout()),
                        value,
                    )
                    .map(Self)
                }

                /// Constructs a register by assigning each named field.
                ///
                /// # Errors
                ///
                /// See [`reg_fields::Register::from_field_map`].
                pub fn from_field_map<I, K>(map: I) -> Result<Self, reg_fields::RegisterError>
                where
                    I: IntoIterator<Item = (K, u128)>,
                    K: AsRef<str>,
                {
                    reg_fields::Register::from_field_map(
                        std::sync::Arc::clone(<Self as reg_fields::RegisterType>::layout()),
                        map,
                    )
                    .map(Self)
                }
            }

            impl reg_fields::RegisterType for #struct_name {
                const NAME: &'static str = #name;
                const SIZE: usize = #size;
                const FIELDS: &'static [reg_fields::Field] = &[#field_list];

                fn layout() -> &'static std::sync::Arc<reg_fields::Layout> {
                    static LAYOUT: std::sync::OnceLock<std::sync::Arc<reg_fields::Layout>> =
                        std::sync::OnceLock::new();
                    LAYOUT.get_or_init(|| {
                        std::sync::Arc::new(reg_fields::Layout::from_checked(
                            <Self as reg_fields::RegisterType>::NAME,
                            <Self as reg_fields::RegisterType>::SIZE,
                            <Self as reg_fields::RegisterType>::FIELDS.to_vec(),
                        ))
                    })
                }
                fn wrap(register: reg_fields::Register) -> Self {
                    Self(register)
                }
                fn as_register(&self) -> &reg_fields::Register {
                    &self.0
                }
            }

            impl Default for #struct_name {
                fn default() -> Self {
                    Self(reg_fields::Register::zeroed(std::sync::Arc::clone(
                        <Self as reg_fields::RegisterType>::layout(),
                    )))
                }
            }
            impl std::ops::Deref for #struct_name {
                type Target = reg_fields::Register;
                fn deref(&self) -> &Self::Target {
                    &self.0
                }
            }
            impl std::ops::DerefMut for #struct_name {
                fn deref_mut(&mut self) -> &mut Self::Target {
                    &mut self.0
                }
            }
            impl std::fmt::Debug for #struct_name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    std::fmt::Debug::fmt(&self.0, f)
                }
            }
            impl std::fmt::Display for #struct_name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    std::fmt::Display::fmt(&self.0, f)
                }
            }
            impl std::convert::TryFrom<reg_fields::Register> for #struct_name {
                type Error = reg_fields::RegisterError;
                fn try_from(register: reg_fields::Register) -> Result<Self, Self::Error> {
                    <Self as reg_fields::RegisterType>::from_register(register)
                }
            }
            impl std::convert::From<#struct_name> for reg_fields::Register {
                fn from(register: #struct_name) -> Self {
                    register.0
                }
            }
        }
    }
}

/// Builder for struct types.
#[derive(Debug)]
pub struct StructBuilder {
    /// `Member` constructors in declaration order.
    members: TokenStream,
    /// Compile time contiguity assertions.
    assertions: TokenStream,
    /// Typed accessors to members.
    accessors: TokenStream,
    /// Type and offset of the previous member.
    previous: Option<(Ident, TokenStream, usize)>,
    /// Rustdoc to attach to the generated struct.
    rustdoc: String,
    /// Struct identifier.
    struct_name: Ident,
}

impl StructBuilder {
    /// Constructs new `StructBuilder`.
    pub fn new(rustdoc: String, struct_name: Ident) -> Self {
        Self {
            members: TokenStream::new(),
            assertions: TokenStream::new(),
            accessors: TokenStream::new(),
            previous: None,
            rustdoc,
            struct_name,
        }
    }

    /// Adds a member to the struct.
    pub(crate) fn add(
        mut self,
        MemberDecl {
            identifier,
            ty,
            offset,
            rustdoc,
        }: MemberDecl,
    ) -> Self {
        let identifier_str = identifier.to_string();
        let offset_literal = Literal::usize_unsuffixed(offset);
        let rustdoc_stream = rustdoc_stream(&rustdoc);

        self.members.extend(quote! {
            reg_fields::Member::of::<#ty>(#identifier_str, #offset_literal),
        });

        // Contiguity
        // ------------------------
        if let Some((previous, previous_ty, previous_offset)) = self.previous.take() {
            let previous_offset = Literal::usize_unsuffixed(previous_offset);
            let message = format!(
                "`{}::{identifier_str}` must start where `{previous}` ends",
                self.struct_name
            );
            self.assertions.extend(quote! {
                const _: () = assert!(
                    #offset_literal == #previous_offset + <#previous_ty as reg_fields::RegisterType>::SIZE,
                    #message
                );
            });
        }
        self.previous = Some((identifier.clone(), ty.clone(), offset));

        // Accessors
        // ------------------------
        let setter = quote::format_ident!("set_{}", identifier);
        self.accessors.extend(quote! {
            #rustdoc_stream
            ///
            /// # Errors
            ///
            /// Never for values of this type.
            pub fn #identifier(&self) -> Result<#ty, reg_fields::RegisterError> {
                self.0.member_as::<#ty>(#identifier_str)
            }
            #rustdoc_stream
            ///
            /// # Errors
            ///
            /// See [`reg_fields::StructRegister::set_bytes`].
            pub fn #setter(&mut self, value: &#ty) -> Result<(), reg_fields::RegisterError> {
                self.0.set_bytes(
                    #offset_literal..#offset_literal + <#ty as reg_fields::RegisterType>::SIZE,
                    &reg_fields::RegisterType::as_register(value).bytes(),
                )
            }
        });

        self
    }

    /// Composes `self` into a `TokenStream`.
    pub fn compose(self) -> TokenStream {
        let StructBuilder {
            members,
            assertions,
            accessors,
            previous: _,
            rustdoc,
            struct_name,
        } = self;
        let name = struct_name.to_string();
        let rustdoc_stream = rustdoc_stream(&rustdoc);

        quote! {
            #rustdoc_stream
            #[derive(Clone, PartialEq, Eq)]
            pub struct #struct_name(reg_fields::StructRegister);

            #assertions

            impl #struct_name {
                /// Constructs a struct from an integer, little-endian bytes or a hex string.
                ///
                /// # Errors
                ///
                /// See [`reg_fields::StructRegister::new`].
                pub fn new(
                    value: impl Into<reg_fields::Value>,
                ) -> Result<Self, reg_fields::RegisterError> {
                    reg_fields::StructRegister::new(
                        std::sync::Arc::clone(<Self as reg_fields::StructType>::layout()),
                        value,
                    )
                    .map(Self)
                }

                #accessors
            }

            impl reg_fields::StructType for #struct_name {
                const NAME: &'static str = #name;

                fn layout() -> &'static std::sync::Arc<reg_fields::StructLayout> {
                    static LAYOUT: std::sync::OnceLock<std::sync::Arc<reg_fields::StructLayout>> =
                        std::sync::OnceLock::new();
                    LAYOUT.get_or_init(|| {
                        std::sync::Arc::new(reg_fields::StructLayout::from_checked(
                            <Self as reg_fields::StructType>::NAME,
                            vec![#members],
                        ))
                    })
                }
                fn as_struct(&self) -> &reg_fields::StructRegister {
                    &self.0
                }
            }

            impl Default for #struct_name {
                fn default() -> Self {
                    Self(reg_fields::StructRegister::zeroed(std::sync::Arc::clone(
                        <Self as reg_fields::StructType>::layout(),
                    )))
                }
            }
            impl std::ops::Deref for #struct_name {
                type Target = reg_fields::StructRegister;
                fn deref(&self) -> &Self::Target {
                    &self.0
                }
            }
            impl std::ops::DerefMut for #struct_name {
                fn deref_mut(&mut self) -> &mut Self::Target {
                    &mut self.0
                }
            }
            impl std::fmt::Debug for #struct_name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    std::fmt::Debug::fmt(&self.0, f)
                }
            }
            impl std::fmt::Display for #struct_name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    std::fmt::Display::fmt(&self.0, f)
                }
            }
            impl std::convert::From<#struct_name> for reg_fields::StructRegister {
                fn from(value: #struct_name) -> Self {
                    value.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use proc_macro2::Span;
    use rand::Rng;

    use super::*;
    use crate::VariantDecl;

    const COMPOSE_FUZZ_LIMIT: usize = 10;
    const ADD_FUZZ_LIMIT: usize = 100;
    const RAND_STR_LEN: usize = 100;

    // Construct an ident with a given string.
    fn ident(s: &str) -> Ident {
        Ident::new(s, Span::call_site())
    }

    // Construct a pseudo-random ident.
    fn rand_ident<R: Rng>(rng: &mut R) -> Ident {
        Ident::new(&rand_string(rng), Span::call_site())
    }

    // Construct a pseudo-random string.
    fn rand_string<R: Rng>(rng: &mut R) -> String {
        (0..RAND_STR_LEN)
            .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
            .collect()
    }

    // Construct a pseudo-random presentation.
    fn rand_repr<R: Rng>(rng: &mut R) -> ReprDecl {
        match rng.gen_range(0..3) {
            0 => ReprDecl::Unsigned,
            1 => ReprDecl::Hex,
            _ => ReprDecl::Enumerated(vec![VariantDecl {
                identifier: rand_ident(rng),
                value: 0,
            }]),
        }
    }

    // Construct a pseudo-random `RegisterBuilder`.
    fn rand_builder<R: Rng>(rng: &mut R, len: usize) -> RegisterBuilder {
        (0..len).fold(default_builder(), |builder, _| {
            let start = rng.gen_range(0..127);
            let end = rng.gen_range(start + 1..=128);
            builder.add(FieldDecl {
                range: Range { start, end },
                rustdoc: rand_string(rng),
                identifier: rand_ident(rng),
                repr: rand_repr(rng),
                read_only: rng.gen(),
            })
        })
    }

    fn default_builder() -> RegisterBuilder {
        RegisterBuilder::new(
            String::from("Some basic rustdoc"),
            ident("DefaultBuilder"),
            RegisterSize::try_from(&Literal::usize_unsuffixed(16)).unwrap(),
        )
    }

    #[test]
    fn builder_add_field() {
        let builder = default_builder().add(FieldDecl {
            range: Range { start: 0, end: 1 },
            rustdoc: String::from("one rustdoc"),
            identifier: ident("one"),
            repr: ReprDecl::Unsigned,
            read_only: false,
        });
        let constants = builder.field_constants.to_string();
        assert!(constants.contains("pub const ONE"));
        assert!(constants.contains("\"one\""));
        assert!(constants.contains("describe"));
        assert_eq!(builder.field_list.to_string(), "Self :: ONE ,");
    }

    #[test]
    fn builder_add_attributes() {
        let builder = default_builder()
            .add(FieldDecl {
                range: Range { start: 12, end: 52 },
                rustdoc: String::new(),
                identifier: ident("ADDR"),
                repr: ReprDecl::Hex,
                read_only: false,
            })
            .add(FieldDecl {
                range: Range { start: 8, end: 11 },
                rustdoc: String::new(),
                identifier: ident("TYPE"),
                repr: ReprDecl::Enumerated(vec![VariantDecl {
                    identifier: ident("NMI"),
                    value: 2,
                }]),
                read_only: false,
            })
            .add(FieldDecl {
                range: Range { start: 0, end: 1 },
                rustdoc: String::new(),
                identifier: ident("LMA"),
                repr: ReprDecl::Unsigned,
                read_only: true,
            });
        let constants = builder.field_constants.to_string();
        assert!(constants.contains(". hex ()"));
        assert!(constants.contains("name : \"NMI\" , value : 2"));
        assert!(constants.contains(". read_only ()"));
        assert!(!constants.contains("describe"));
    }

    #[test]
    fn builder_add_fuzz() {
        let mut rng = rand::thread_rng();
        let _builder = rand_builder(&mut rng, ADD_FUZZ_LIMIT);
    }

    #[test]
    fn builder_compose_fuzz() {
        let mut rng = rand::thread_rng();
        for _ in 0..COMPOSE_FUZZ_LIMIT {
            let builder = rand_builder(&mut rng, COMPOSE_FUZZ_LIMIT);
            let _token_stream = builder.compose();
        }
    }

    #[test]
    fn struct_builder_compose() {
        let builder = StructBuilder::new(String::new(), ident("Gdtr"))
            .add(MemberDecl {
                identifier: ident("limit"),
                ty: quote! { GdtLimit },
                offset: 0,
                rustdoc: String::from("Limit"),
            })
            .add(MemberDecl {
                identifier: ident("base"),
                ty: quote! { GdtBase },
                offset: 2,
                rustdoc: String::new(),
            });
        let assertions = builder.assertions.to_string();
        assert!(assertions.contains("2 == 0 + < GdtLimit as reg_fields :: RegisterType > :: SIZE"));
        let accessors = builder.accessors.to_string();
        assert!(accessors.contains("fn limit"));
        assert!(accessors.contains("fn set_base"));
        let tokens = builder.compose().to_string();
        assert!(tokens.contains("pub struct Gdtr"));
        assert!(tokens.contains("Member :: of :: < GdtBase > (\"base\" , 2)"));
    }
}
