//! Chain-level building blocks.
//!
//! - `Block`/`Header`: the block under construction and its sealed wire form
//! - `BlockChain`: the canonical index with validated import and trusted insert
//! - `engine`: pluggable consensus sealing
//! - `executor`: deterministic transaction execution

pub mod account;
pub mod block;
pub mod blockchain;
pub mod engine;
pub mod executor;
pub mod genesis;
pub mod receipt;
pub mod transaction;
