//! Block import pipeline with Merkle-trie state synchronization.
//!
//! A full node validates sealed blocks by re-executing every transaction and
//! comparing the recomputed state, transaction, and receipt roots against the
//! header ([`core::blockchain::BlockChain::import`]). A light node appends
//! pre-validated blocks with externally supplied receipts
//! ([`core::blockchain::BlockChain::insert`]) and backfills its world state
//! by walking the trie below a block's state root, copying missing nodes out
//! of a peer's content-addressed store ([`state::sync::StateSync`]).

pub mod core;
pub mod crypto;
pub mod state;
pub mod types;
pub mod utils;
