//! State-trie synchronization between content-addressed stores.

use crate::state::content_store::NodeStore;
use crate::state::trie::TrieNode;
use crate::types::encoding::{Decode, DecodeError};
use crate::types::hash::Hash;
use crate::utils::log::Logger;
use chainsync_derive::Error;
use std::collections::HashSet;

/// Reasons a synchronization run fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    /// A node reachable from the root is absent from the source store.
    #[error("trie node {hash} is missing from the source store")]
    MissingNode { hash: Hash },
    #[error("fetched trie node does not decode: {0}")]
    Node(DecodeError),
}

/// Classifies raw node bytes and returns the child hashes they reference.
pub fn child_references(node_bytes: &[u8]) -> Result<Vec<Hash>, SyncError> {
    let node = TrieNode::from_bytes(node_bytes).map_err(SyncError::Node)?;
    Ok(node.child_references())
}

/// Copies the trie reachable from a state root out of one store into
/// another. Used by light clients to backfill world state after inserting
/// headers they did not execute.
pub struct StateSync {
    log: Logger,
}

impl StateSync {
    pub fn new(log: Logger) -> Self {
        Self { log }
    }

    /// Walks the trie rooted at `root` depth-first, fetching each distinct
    /// reachable node from `source`, then writes the collected nodes into
    /// `dest` once the whole walk has succeeded. Returns the number of
    /// distinct nodes copied.
    ///
    /// A failed run writes nothing, so `dest` never ends up with a partial
    /// subtree attributed to `root`.
    pub fn sync(
        &self,
        root: Hash,
        source: &dyn NodeStore,
        dest: &dyn NodeStore,
    ) -> Result<usize, SyncError> {
        if root == Hash::zero() {
            return Ok(0);
        }

        let mut todo = vec![root];
        let mut visited: HashSet<Hash> = HashSet::new();
        let mut collected: Vec<(Hash, Vec<u8>)> = Vec::new();

        while let Some(hash) = todo.pop() {
            if !visited.insert(hash) {
                continue;
            }
            let bytes = source
                .get(hash)
                .ok_or(SyncError::MissingNode { hash })?;
            for child in child_references(&bytes)? {
                if !visited.contains(&child) {
                    todo.push(child);
                }
            }
            collected.push((hash, bytes));
        }

        let copied = collected.len();
        for (hash, bytes) in collected {
            dest.put(hash, bytes);
        }
        self.log
            .info(&format!("synced {copied} trie nodes below root {root}"));
        Ok(copied)
    }
}
