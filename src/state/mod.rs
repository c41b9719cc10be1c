//! World-state storage: content-addressed node store, write overlays, the
//! hash-linked state trie, and trie synchronization between stores.

pub mod account_state;
pub mod content_store;
pub mod overlay;
pub mod sync;
pub mod trie;
