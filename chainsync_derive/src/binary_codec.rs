//! `#[derive(BinaryCodec)]` expansion.
//!
//! Structs encode their fields in declaration order. Enums encode a one-byte
//! variant tag followed by the variant's fields. Decoding rejects unknown
//! tags with `DecodeError::InvalidValue`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DataEnum, DeriveInput, Fields};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let (encode_body, decode_body) = match &input.data {
        Data::Struct(data) => struct_bodies(&data.fields),
        Data::Enum(data) => enum_bodies(data),
        Data::Union(_) => {
            return syn::Error::new_spanned(&input, "BinaryCodec does not support unions")
                .to_compile_error()
                .into();
        }
    };

    TokenStream::from(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            fn decode(
                input: &mut &[u8],
            ) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

fn struct_bodies(fields: &Fields) -> (TokenStream2, TokenStream2) {
    match fields {
        Fields::Named(fields) => {
            let names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
            let encode = quote! {
                #(crate::types::encoding::Encode::encode(&self.#names, out);)*
            };
            let decode = quote! {
                Ok(Self {
                    #(#names: crate::types::encoding::Decode::decode(input)?,)*
                })
            };
            (encode, decode)
        }
        Fields::Unnamed(fields) => {
            let indices: Vec<syn::Index> =
                (0..fields.unnamed.len()).map(syn::Index::from).collect();
            let reads = indices
                .iter()
                .map(|_| quote! { crate::types::encoding::Decode::decode(input)?, });
            let encode = quote! {
                #(crate::types::encoding::Encode::encode(&self.#indices, out);)*
            };
            let decode = quote! { Ok(Self(#(#reads)*)) };
            (encode, decode)
        }
        Fields::Unit => (
            quote! { let _ = out; },
            quote! { let _ = input; Ok(Self) },
        ),
    }
}

fn enum_bodies(data: &DataEnum) -> (TokenStream2, TokenStream2) {
    let encode_arms = data.variants.iter().enumerate().map(|(i, variant)| {
        let tag = i as u8;
        let vname = &variant.ident;
        match &variant.fields {
            Fields::Unit => quote! {
                Self::#vname => crate::types::encoding::Encode::encode(&#tag, out),
            },
            Fields::Unnamed(fields) => {
                let binds: Vec<_> = (0..fields.unnamed.len())
                    .map(|j| format_ident!("f{j}"))
                    .collect();
                quote! {
                    Self::#vname(#(#binds),*) => {
                        crate::types::encoding::Encode::encode(&#tag, out);
                        #(crate::types::encoding::Encode::encode(#binds, out);)*
                    }
                }
            }
            Fields::Named(fields) => {
                let binds: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
                quote! {
                    Self::#vname { #(#binds),* } => {
                        crate::types::encoding::Encode::encode(&#tag, out);
                        #(crate::types::encoding::Encode::encode(#binds, out);)*
                    }
                }
            }
        }
    });

    let decode_arms = data.variants.iter().enumerate().map(|(i, variant)| {
        let tag = i as u8;
        let vname = &variant.ident;
        match &variant.fields {
            Fields::Unit => quote! { #tag => Ok(Self::#vname), },
            Fields::Unnamed(fields) => {
                let reads = (0..fields.unnamed.len())
                    .map(|_| quote! { crate::types::encoding::Decode::decode(input)?, });
                quote! { #tag => Ok(Self::#vname(#(#reads)*)), }
            }
            Fields::Named(fields) => {
                let reads = fields.named.iter().map(|f| {
                    let fname = &f.ident;
                    quote! { #fname: crate::types::encoding::Decode::decode(input)?, }
                });
                quote! { #tag => Ok(Self::#vname { #(#reads)* }), }
            }
        }
    });

    let encode = quote! {
        match self {
            #(#encode_arms)*
        }
    };
    let decode = quote! {
        let tag: u8 = crate::types::encoding::Decode::decode(input)?;
        match tag {
            #(#decode_arms)*
            _ => Err(crate::types::encoding::DecodeError::InvalidValue),
        }
    };
    (encode, decode)
}
