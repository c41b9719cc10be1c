//! Primitive types shared across the crate.
//!
//! - `Hash`: fixed-size 32-byte SHA3-256 hashes
//! - `Address`: 20-byte account identifiers
//! - `encoding`: the deterministic binary codec everything serializes with

pub mod address;
pub mod encoding;
pub mod hash;
pub mod signature;
