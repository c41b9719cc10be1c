//! Content-addressed node storage.

use crate::types::hash::Hash;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read/write access to content-addressed nodes.
///
/// Keys are always the SHA3-256 hash of the stored bytes, which makes `put`
/// idempotent: writing the same pair twice is observably a no-op, so
/// concurrent writers never conflict.
pub trait NodeStore: Send + Sync {
    fn get(&self, hash: Hash) -> Option<Vec<u8>>;
    fn put(&self, hash: Hash, bytes: Vec<u8>);
}

impl<T: NodeStore + ?Sized> NodeStore for &T {
    fn get(&self, hash: Hash) -> Option<Vec<u8>> {
        (**self).get(hash)
    }

    fn put(&self, hash: Hash, bytes: Vec<u8>) {
        (**self).put(hash, bytes)
    }
}

impl<T: NodeStore + ?Sized> NodeStore for Arc<T> {
    fn get(&self, hash: Hash) -> Option<Vec<u8>> {
        (**self).get(hash)
    }

    fn put(&self, hash: Hash, bytes: Vec<u8>) {
        (**self).put(hash, bytes)
    }
}

/// In-memory content-addressed store mapping node hashes to raw bytes.
///
/// Backed by a concurrent map; safe to share across the chain, blocks under
/// construction, and the synchronizer.
pub struct ContentStore {
    nodes: DashMap<Hash, Vec<u8>>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    pub fn contains(&self, hash: Hash) -> bool {
        self.nodes.contains_key(&hash)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deterministic full dump, for comparing two stores node-for-node.
    pub fn dump(&self) -> BTreeMap<Hash, Vec<u8>> {
        self.nodes
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for ContentStore {
    fn get(&self, hash: Hash) -> Option<Vec<u8>> {
        self.nodes.get(&hash).map(|entry| entry.value().clone())
    }

    fn put(&self, hash: Hash, bytes: Vec<u8>) {
        debug_assert_eq!(
            hash,
            Hash::of(&bytes),
            "content-addressed key must be the hash of the value"
        );
        self.nodes.entry(hash).or_insert(bytes);
    }
}
