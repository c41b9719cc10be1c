//! Hash-linked state trie.
//!
//! Nodes live in a content-addressed store, keyed by the hash of their
//! encoding, so a root hash commits to the entire tree below it. Three node
//! shapes: a `Branch` with sixteen positional child slots plus a value slot,
//! an `Extension` carrying a run of shared nibbles and one child reference,
//! and a `Leaf` carrying the remaining nibbles and an inline value. The
//! encoding carries an explicit node-kind tag, so classification never
//! depends on item counts or on a payload happening to be 32 bytes long.

use crate::state::content_store::NodeStore;
use crate::types::encoding::{Decode, DecodeError, Encode};
use crate::types::hash::{Hash, HASH_LEN};
use chainsync_derive::{BinaryCodec, Error};

/// Number of child slots in a branch node, one per nibble value.
pub const BRANCH_WIDTH: usize = 16;

/// Decoded form of a stored trie node.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub enum TrieNode {
    /// Sixteen positional child slots plus a value slot for keys ending here.
    Branch {
        children: [Option<Hash>; BRANCH_WIDTH],
        value: Option<Vec<u8>>,
    },
    /// A run of nibbles shared by every key below `child`.
    Extension { path: Vec<u8>, child: Hash },
    /// Terminal node: the remaining nibble path and the stored value.
    Leaf { path: Vec<u8>, value: Vec<u8> },
}

impl TrieNode {
    /// Child hashes this node references: up to sixteen for a branch,
    /// exactly one for an extension, none for a leaf. Each slot contributes
    /// at most one reference.
    pub fn child_references(&self) -> Vec<Hash> {
        match self {
            TrieNode::Branch { children, .. } => children.iter().flatten().copied().collect(),
            TrieNode::Extension { child, .. } => vec![*child],
            TrieNode::Leaf { .. } => Vec::new(),
        }
    }
}

/// Reasons a trie operation fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrieError {
    #[error("trie node {0} is missing from the store")]
    MissingNode(Hash),
    #[error("stored trie node does not decode: {0}")]
    Node(DecodeError),
}

/// Expands a key into its nibble path, high half-byte first.
pub(crate) fn nibbles(key: &Hash) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 * HASH_LEN);
    for byte in key.as_slice() {
        out.push(byte >> 4);
        out.push(byte & 0x0f);
    }
    out
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// A trie rooted at a node hash, reading and writing through a store.
///
/// `Hash::zero()` is the empty-trie sentinel and never names a stored node.
/// Inserts write new nodes immediately; old nodes are never overwritten, so
/// every historical root stays readable.
pub struct Trie<'a> {
    store: &'a dyn NodeStore,
    root: Hash,
}

impl<'a> Trie<'a> {
    pub fn new(store: &'a dyn NodeStore, root: Hash) -> Self {
        Self { store, root }
    }

    pub fn root(&self) -> Hash {
        self.root
    }

    /// Looks up the value stored under `key`, if any.
    pub fn get(&self, key: Hash) -> Result<Option<Vec<u8>>, TrieError> {
        if self.root == Hash::zero() {
            return Ok(None);
        }
        let path = nibbles(&key);
        let mut remaining: &[u8] = &path;
        let mut current = self.root;
        loop {
            match self.load(current)? {
                TrieNode::Leaf {
                    path: leaf_path,
                    value,
                } => {
                    return Ok(if leaf_path == remaining {
                        Some(value)
                    } else {
                        None
                    });
                }
                TrieNode::Extension {
                    path: ext_path,
                    child,
                } => {
                    if remaining.len() >= ext_path.len()
                        && remaining[..ext_path.len()] == ext_path[..]
                    {
                        remaining = &remaining[ext_path.len()..];
                        current = child;
                    } else {
                        return Ok(None);
                    }
                }
                TrieNode::Branch { children, value } => match remaining.split_first() {
                    None => return Ok(value),
                    Some((index, rest)) => match children[*index as usize] {
                        Some(child) => {
                            current = child;
                            remaining = rest;
                        }
                        None => return Ok(None),
                    },
                },
            }
        }
    }

    /// Stores `value` under `key`, returning the new root hash.
    pub fn insert(&mut self, key: Hash, value: Vec<u8>) -> Result<Hash, TrieError> {
        let path = nibbles(&key);
        let root = self.root;
        self.root = self.insert_at(root, &path, value)?;
        Ok(self.root)
    }

    fn load(&self, hash: Hash) -> Result<TrieNode, TrieError> {
        let bytes = self
            .store
            .get(hash)
            .ok_or(TrieError::MissingNode(hash))?;
        TrieNode::from_bytes(&bytes).map_err(TrieError::Node)
    }

    fn store_node(&self, node: &TrieNode) -> Hash {
        let bytes = node.to_bytes();
        let hash = Hash::of(&bytes);
        self.store.put(hash, bytes);
        hash
    }

    fn insert_at(&self, at: Hash, path: &[u8], value: Vec<u8>) -> Result<Hash, TrieError> {
        if at == Hash::zero() {
            return Ok(self.store_node(&TrieNode::Leaf {
                path: path.to_vec(),
                value,
            }));
        }

        match self.load(at)? {
            TrieNode::Leaf {
                path: leaf_path,
                value: leaf_value,
            } => {
                if leaf_path == path {
                    return Ok(self.store_node(&TrieNode::Leaf {
                        path: leaf_path,
                        value,
                    }));
                }
                self.split_leaves(leaf_path, leaf_value, path, value)
            }
            TrieNode::Extension {
                path: ext_path,
                child,
            } => {
                let common = common_prefix(&ext_path, path);
                if common == ext_path.len() {
                    let new_child = self.insert_at(child, &path[common..], value)?;
                    return Ok(self.store_node(&TrieNode::Extension {
                        path: ext_path,
                        child: new_child,
                    }));
                }

                // The new key diverges inside the extension's path: break it
                // at the divergence with a branch.
                let mut children: [Option<Hash>; BRANCH_WIDTH] = Default::default();
                let mut branch_value = None;

                let ext_index = ext_path[common] as usize;
                let ext_rest = ext_path[common + 1..].to_vec();
                children[ext_index] = Some(if ext_rest.is_empty() {
                    child
                } else {
                    self.store_node(&TrieNode::Extension {
                        path: ext_rest,
                        child,
                    })
                });

                if common == path.len() {
                    branch_value = Some(value);
                } else {
                    let key_index = path[common] as usize;
                    children[key_index] = Some(self.store_node(&TrieNode::Leaf {
                        path: path[common + 1..].to_vec(),
                        value,
                    }));
                }

                let branch = self.store_node(&TrieNode::Branch {
                    children,
                    value: branch_value,
                });
                Ok(if common == 0 {
                    branch
                } else {
                    self.store_node(&TrieNode::Extension {
                        path: ext_path[..common].to_vec(),
                        child: branch,
                    })
                })
            }
            TrieNode::Branch {
                mut children,
                value: branch_value,
            } => {
                if path.is_empty() {
                    return Ok(self.store_node(&TrieNode::Branch {
                        children,
                        value: Some(value),
                    }));
                }
                let index = path[0] as usize;
                let new_child = match children[index] {
                    Some(child) => self.insert_at(child, &path[1..], value)?,
                    None => self.store_node(&TrieNode::Leaf {
                        path: path[1..].to_vec(),
                        value,
                    }),
                };
                children[index] = Some(new_child);
                Ok(self.store_node(&TrieNode::Branch {
                    children,
                    value: branch_value,
                }))
            }
        }
    }

    fn split_leaves(
        &self,
        old_path: Vec<u8>,
        old_value: Vec<u8>,
        new_path: &[u8],
        new_value: Vec<u8>,
    ) -> Result<Hash, TrieError> {
        let common = common_prefix(&old_path, new_path);
        let prefix = old_path[..common].to_vec();
        let mut children: [Option<Hash>; BRANCH_WIDTH] = Default::default();
        let mut branch_value = None;

        for (path, value) in [(old_path, old_value), (new_path.to_vec(), new_value)] {
            if path.len() == common {
                branch_value = Some(value);
            } else {
                let index = path[common] as usize;
                children[index] = Some(self.store_node(&TrieNode::Leaf {
                    path: path[common + 1..].to_vec(),
                    value,
                }));
            }
        }

        let branch = self.store_node(&TrieNode::Branch {
            children,
            value: branch_value,
        });
        Ok(if common == 0 {
            branch
        } else {
            self.store_node(&TrieNode::Extension {
                path: prefix,
                child: branch,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::content_store::ContentStore;
    use crate::utils::test_utils::utils::random_hash;

    #[test]
    fn empty_trie_has_no_entries() {
        let store = ContentStore::new();
        let trie = Trie::new(&store, Hash::zero());
        assert_eq!(trie.get(random_hash()), Ok(None));
    }

    #[test]
    fn single_insert_round_trips() {
        let store = ContentStore::new();
        let mut trie = Trie::new(&store, Hash::zero());
        let key = random_hash();

        let root = trie.insert(key, b"value".to_vec()).unwrap();
        assert_ne!(root, Hash::zero());
        assert_eq!(trie.get(key), Ok(Some(b"value".to_vec())));
        assert_eq!(trie.get(random_hash()), Ok(None));
    }

    #[test]
    fn many_inserts_stay_readable() {
        let store = ContentStore::new();
        let mut trie = Trie::new(&store, Hash::zero());

        let keys: Vec<Hash> = (0..64).map(|_| random_hash()).collect();
        for (i, key) in keys.iter().enumerate() {
            trie.insert(*key, vec![i as u8]).unwrap();
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(trie.get(*key), Ok(Some(vec![i as u8])));
        }
    }

    #[test]
    fn update_changes_the_root_and_the_value() {
        let store = ContentStore::new();
        let mut trie = Trie::new(&store, Hash::zero());
        let key = random_hash();

        let first = trie.insert(key, b"one".to_vec()).unwrap();
        let second = trie.insert(key, b"two".to_vec()).unwrap();
        assert_ne!(first, second);
        assert_eq!(trie.get(key), Ok(Some(b"two".to_vec())));
    }

    #[test]
    fn old_roots_stay_readable_after_updates() {
        let store = ContentStore::new();
        let mut trie = Trie::new(&store, Hash::zero());
        let key = random_hash();

        let old_root = trie.insert(key, b"old".to_vec()).unwrap();
        trie.insert(key, b"new".to_vec()).unwrap();

        let old_view = Trie::new(&store, old_root);
        assert_eq!(old_view.get(key), Ok(Some(b"old".to_vec())));
    }

    #[test]
    fn root_is_independent_of_insertion_order() {
        let keys: Vec<Hash> = (0..16).map(|_| random_hash()).collect();

        let store_a = ContentStore::new();
        let mut trie_a = Trie::new(&store_a, Hash::zero());
        for key in &keys {
            trie_a.insert(*key, key.as_slice().to_vec()).unwrap();
        }

        let store_b = ContentStore::new();
        let mut trie_b = Trie::new(&store_b, Hash::zero());
        for key in keys.iter().rev() {
            trie_b.insert(*key, key.as_slice().to_vec()).unwrap();
        }

        assert_eq!(trie_a.root(), trie_b.root());
    }

    #[test]
    fn shared_prefixes_produce_extensions() {
        let store = ContentStore::new();
        let mut trie = Trie::new(&store, Hash::zero());

        // Differ only in the final byte, sharing a 62-nibble prefix.
        let mut a = [0xaau8; HASH_LEN];
        let mut b = [0xaau8; HASH_LEN];
        a[HASH_LEN - 1] = 0x01;
        b[HASH_LEN - 1] = 0x02;

        trie.insert(Hash(a), b"a".to_vec()).unwrap();
        let root = trie.insert(Hash(b), b"b".to_vec()).unwrap();

        let top = TrieNode::from_bytes(&store.get(root).unwrap()).unwrap();
        assert!(matches!(top, TrieNode::Extension { .. }));
        assert_eq!(trie.get(Hash(a)), Ok(Some(b"a".to_vec())));
        assert_eq!(trie.get(Hash(b)), Ok(Some(b"b".to_vec())));
    }

    #[test]
    fn missing_node_surfaces_as_an_error() {
        let store = ContentStore::new();
        let trie = Trie::new(&store, Hash::of(b"never stored"));
        assert_eq!(
            trie.get(random_hash()),
            Err(TrieError::MissingNode(Hash::of(b"never stored")))
        );
    }

    #[test]
    fn node_kind_survives_the_codec() {
        let node = TrieNode::Extension {
            path: vec![1, 2, 3],
            child: random_hash(),
        };
        let decoded = TrieNode::from_bytes(&node.to_bytes()).unwrap();
        assert_eq!(node, decoded);

        // A leaf whose value is exactly 32 bytes still decodes as a leaf.
        let leaf = TrieNode::Leaf {
            path: vec![4, 5],
            value: random_hash().as_slice().to_vec(),
        };
        let decoded = TrieNode::from_bytes(&leaf.to_bytes()).unwrap();
        assert!(matches!(decoded, TrieNode::Leaf { .. }));
        assert!(decoded.child_references().is_empty());
    }

    #[test]
    fn branch_references_come_from_distinct_slots() {
        let mut children: [Option<Hash>; BRANCH_WIDTH] = Default::default();
        children[0] = Some(random_hash());
        children[7] = Some(random_hash());
        children[15] = Some(random_hash());
        let node = TrieNode::Branch {
            children,
            value: Some(b"v".to_vec()),
        };

        let refs = node.child_references();
        assert_eq!(refs.len(), 3);
        assert!(refs.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn nibbles_expand_high_half_first() {
        let mut raw = [0u8; HASH_LEN];
        raw[0] = 0xab;
        let path = nibbles(&Hash(raw));
        assert_eq!(path.len(), 2 * HASH_LEN);
        assert_eq!(&path[..2], &[0x0a, 0x0b]);
    }
}
