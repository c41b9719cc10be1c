//! `#[derive(Error)]` expansion.
//!
//! Generates `Display` and `std::error::Error` for an error enum. Each
//! variant carries an `#[error("...")]` attribute; `{0}`-style positional
//! placeholders and `{field}` named placeholders interpolate the variant's
//! fields. Every field of a variant must appear in its message.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields, Lit, Meta};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "Error derive supports only enums",
        ));
    };

    let arms = data
        .variants
        .iter()
        .map(|variant| {
            let vname = &variant.ident;
            let message = error_message(variant)?;
            Ok(match &variant.fields {
                Fields::Unit => quote! {
                    Self::#vname => write!(f, #message),
                },
                Fields::Unnamed(fields) => {
                    let binds: Vec<_> = (0..fields.unnamed.len())
                        .map(|i| format_ident!("f{i}"))
                        .collect();
                    let message = positional_to_named(&message, binds.len());
                    quote! {
                        Self::#vname(#(#binds),*) => write!(f, #message, #(#binds = #binds),*),
                    }
                }
                Fields::Named(fields) => {
                    let binds: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();
                    quote! {
                        Self::#vname { #(#binds),* } => write!(f, #message, #(#binds = #binds),*),
                    }
                }
            })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#arms)*
                }
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

fn error_message(variant: &syn::Variant) -> syn::Result<String> {
    for attr in &variant.attrs {
        if attr.path().is_ident("error") {
            if let Meta::List(list) = &attr.meta {
                if let Ok(Lit::Str(lit)) = syn::parse2::<Lit>(list.tokens.clone()) {
                    return Ok(lit.value());
                }
            }
            return Err(syn::Error::new_spanned(
                &attr.meta,
                "expected #[error(\"message\")] with a string literal",
            ));
        }
    }
    Err(syn::Error::new_spanned(
        variant,
        "missing #[error(\"...\")] attribute on error variant",
    ))
}

/// Rewrites `{0}` placeholders to the `{f0}` names the match arm binds.
fn positional_to_named(message: &str, field_count: usize) -> String {
    let mut out = message.to_string();
    for i in (0..field_count).rev() {
        out = out.replace(&format!("{{{i}}}"), &format!("{{f{i}}}"));
    }
    out
}
