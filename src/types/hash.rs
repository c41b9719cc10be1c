//! 32-byte SHA3-256 hash type with zero-allocation hashing.

use crate::types::encoding::EncodeSink;
use chainsync_derive::BinaryCodec;
use sha3::{Digest, Sha3_256};
use std::fmt;

/// SHA3-256 hash length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size 32-byte hash identifying blocks, transactions, and trie nodes.
///
/// `Copy` on purpose: hashes are passed around constantly during validation
/// and belong on the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// All-zero hash, used as the empty-trie sentinel and the genesis
    /// parent reference. Never names a stored node.
    pub fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    /// Content hash of a raw byte string.
    pub fn of(bytes: &[u8]) -> Hash {
        let mut builder = Hash::sha3();
        builder.update(bytes);
        builder.finalize()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Creates a SHA3-256 builder for incremental hashing.
    pub fn sha3() -> HashBuilder {
        HashBuilder::new()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Incremental SHA3-256 hash builder.
///
/// Implements [`EncodeSink`] so encodable values hash without an
/// intermediate byte buffer.
pub struct HashBuilder {
    hasher: Sha3_256,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    /// Feeds data into the hash computation.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Feeds data and returns the builder, for one-line hash chains.
    pub fn chain(mut self, data: &[u8]) -> Self {
        self.hasher.update(data);
        self
    }

    /// Consumes the builder and returns the final hash.
    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}
