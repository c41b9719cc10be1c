//! Derive macros for the chainsync crate.

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements the `Encode` and `Decode` traits from
/// `chainsync::types::encoding` for a struct or enum.
///
/// Fields are written in declaration order; enum variants carry a one-byte
/// tag assigned in declaration order. The resulting byte layout is fully
/// deterministic, which makes it safe to feed into content hashing.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display` and `std::error::Error` for an error enum from
/// `#[error("...")]` attributes on its variants.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
