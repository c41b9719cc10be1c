//! Write-buffer overlay over a node store.

use crate::state::content_store::NodeStore;
use crate::types::hash::Hash;
use dashmap::DashMap;

/// Buffers writes on top of a base store.
///
/// Reads check the buffer first and fall through to the base. `commit`
/// merges every buffered node into the base; `discard` throws the buffer
/// away without touching it. A block under construction owns one of these
/// as its working state, and import uses a scratch overlay so a rejected
/// block leaves the backing store untouched.
pub struct StoreOverlay<B: NodeStore> {
    base: B,
    writes: DashMap<Hash, Vec<u8>>,
}

impl<B: NodeStore> StoreOverlay<B> {
    pub fn new(base: B) -> Self {
        Self {
            base,
            writes: DashMap::new(),
        }
    }

    /// Number of buffered nodes not yet in the base.
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Merges every buffered node into the base store and clears the buffer.
    pub fn commit(&self) {
        for entry in self.writes.iter() {
            self.base.put(*entry.key(), entry.value().clone());
        }
        self.writes.clear();
    }

    /// Drops all buffered writes.
    pub fn discard(&self) {
        self.writes.clear();
    }
}

impl<B: NodeStore> NodeStore for StoreOverlay<B> {
    fn get(&self, hash: Hash) -> Option<Vec<u8>> {
        if let Some(entry) = self.writes.get(&hash) {
            return Some(entry.value().clone());
        }
        self.base.get(hash)
    }

    fn put(&self, hash: Hash, bytes: Vec<u8>) {
        self.writes.entry(hash).or_insert(bytes);
    }
}
