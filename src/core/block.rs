//! Block headers and the mutable block under construction.

use crate::core::blockchain::BlockChain;
use crate::core::engine::SealEngine;
use crate::core::executor::{EnvInfo, ExecutionError, Executor};
use crate::core::receipt::{receipts_root, Receipt};
use crate::core::transaction::{transactions_root, Transaction};
use crate::state::account_state::AccountState;
use crate::state::content_store::ContentStore;
use crate::state::overlay::StoreOverlay;
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use chainsync_derive::{BinaryCodec, Error};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Block header: chain linkage, state commitments, and the consensus seal.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Header {
    /// Hash of the parent block, forming the chain.
    pub parent_hash: Hash,
    /// Block height (genesis = 0).
    pub number: u64,
    /// Unix timestamp in seconds, strictly greater than the parent's.
    pub timestamp: u64,
    /// Account credited with transaction fees.
    pub beneficiary: Address,
    /// Root of the world-state trie after executing this block.
    pub state_root: Hash,
    /// Commitment over the ordered transaction list.
    pub transactions_root: Hash,
    /// Commitment over the ordered receipt list.
    pub receipts_root: Hash,
    /// Total gas consumed by the block's transactions.
    pub gas_used: u64,
    /// Contribution of this block to the chain's total weight.
    pub difficulty: u64,
    /// Free-form bytes chosen by the producer.
    pub extra_data: Vec<u8>,
    /// Consensus-specific seal bytes; empty until the block is sealed.
    pub seal: Vec<u8>,
}

impl Header {
    /// Content hash of the full header encoding: the block's identity.
    pub fn hash(&self) -> Hash {
        let mut h = Hash::sha3();
        h.update(b"BLOCK_HEADER");
        self.encode(&mut h);
        h.finalize()
    }

    /// Header hash with the seal cleared: what a sealing engine signs.
    pub fn bare_hash(&self) -> Hash {
        let mut bare = self.clone();
        bare.seal = Vec::new();
        bare.hash()
    }
}

/// Immutable wire form of a sealed block.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct SealedBlock {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl SealedBlock {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

/// Reasons the seal step rejects a block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("block must be committed for sealing first")]
    NotCommitted,
    #[error("block is already sealed")]
    AlreadySealed,
    #[error("seal bytes do not verify for this header")]
    SealMismatch,
}

/// A block being assembled on top of a chain head.
///
/// Owns an overlay of trie nodes over the chain's state store; nothing
/// reaches the shared store until the sealed block is imported. Re-syncing
/// discards the overlay and pending transactions and re-roots the block on
/// the current head.
pub struct Block {
    header: Header,
    transactions: Vec<Transaction>,
    receipts: Vec<Receipt>,
    state: StoreOverlay<Arc<ContentStore>>,
    state_root: Hash,
    committed: bool,
    sealed: Option<SealedBlock>,
}

impl Block {
    /// Creates an unsynced block over `state_db`, paying fees to
    /// `beneficiary`. Call [`sync`](Self::sync) before executing anything.
    pub fn new(state_db: Arc<ContentStore>, beneficiary: Address) -> Self {
        Self {
            header: Header {
                parent_hash: Hash::zero(),
                number: 0,
                timestamp: 0,
                beneficiary,
                state_root: Hash::zero(),
                transactions_root: transactions_root(&[]),
                receipts_root: receipts_root(&[]),
                gas_used: 0,
                difficulty: 1,
                extra_data: Vec::new(),
                seal: Vec::new(),
            },
            transactions: Vec::new(),
            receipts: Vec::new(),
            state: StoreOverlay::new(state_db),
            state_root: Hash::zero(),
            committed: false,
            sealed: None,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    /// Root of the working state, updated by every executed transaction.
    pub fn state_root(&self) -> Hash {
        self.state_root
    }

    pub fn set_beneficiary(&mut self, beneficiary: Address) {
        self.header.beneficiary = beneficiary;
    }

    /// Rebases this block onto the chain's current head.
    ///
    /// Pending transactions, receipts, buffered state, and any previous
    /// commitment or seal are discarded.
    pub fn sync(&mut self, chain: &BlockChain) {
        let head = chain.head_header();

        self.state.discard();
        self.state_root = head.state_root;
        self.transactions.clear();
        self.receipts.clear();
        self.committed = false;
        self.sealed = None;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.header.parent_hash = head.hash();
        self.header.number = head.number + 1;
        self.header.timestamp = now.max(head.timestamp + 1);
        self.header.state_root = Hash::zero();
        self.header.transactions_root = transactions_root(&[]);
        self.header.receipts_root = receipts_root(&[]);
        self.header.gas_used = 0;
        self.header.difficulty = 1;
        self.header.seal.clear();
    }

    /// Executes one transaction into the working state.
    ///
    /// Runs inside a per-transaction overlay: a failed transaction is
    /// dropped wholesale and leaves the block's pending lists and working
    /// state exactly as they were.
    pub fn execute(
        &mut self,
        last_hashes: &[Hash],
        executor: &dyn Executor,
        tx: Transaction,
    ) -> Result<Receipt, ExecutionError> {
        let env = EnvInfo {
            number: self.header.number,
            timestamp: self.header.timestamp,
            beneficiary: self.header.beneficiary,
            last_hashes: last_hashes.to_vec(),
        };

        let tx_overlay = StoreOverlay::new(&self.state);
        let mut state = AccountState::new(&tx_overlay, self.state_root);
        let mut receipt = executor.execute(&mut state, &env, &tx)?;
        let new_root = state.root();
        tx_overlay.commit();

        receipt.cumulative_gas_used = self.header.gas_used + receipt.gas_used;
        self.header.gas_used += receipt.gas_used;
        self.state_root = new_root;
        self.transactions.push(tx);
        self.receipts.push(receipt.clone());
        self.header.transactions_root = transactions_root(&self.transactions);
        self.header.receipts_root = receipts_root(&self.receipts);
        Ok(receipt)
    }

    /// Freezes every header field derivable without the seal itself.
    pub fn commit_to_seal(&mut self, chain: &BlockChain) {
        if let Some(parent) = chain.header(self.header.parent_hash) {
            if self.header.timestamp <= parent.timestamp {
                self.header.timestamp = parent.timestamp + 1;
            }
        }
        self.header.state_root = self.state_root;
        self.header.transactions_root = transactions_root(&self.transactions);
        self.header.receipts_root = receipts_root(&self.receipts);
        self.committed = true;
    }

    /// Merges externally produced seal bytes and returns the encoded sealed
    /// block. The header is immutable afterwards.
    pub fn seal_block(
        &mut self,
        engine: &dyn SealEngine,
        seal: &[u8],
    ) -> Result<Vec<u8>, BlockError> {
        if !self.committed {
            return Err(BlockError::NotCommitted);
        }
        if self.sealed.is_some() {
            return Err(BlockError::AlreadySealed);
        }

        let mut header = self.header.clone();
        header.seal = seal.to_vec();
        if !engine.verify_seal(&header) {
            return Err(BlockError::SealMismatch);
        }

        self.header = header;
        let sealed = SealedBlock {
            header: self.header.clone(),
            transactions: self.transactions.clone(),
        };
        let bytes = sealed.to_bytes();
        self.sealed = Some(sealed);
        Ok(bytes)
    }

    /// Encoded bytes of the sealed block, if sealing has happened.
    pub fn block_data(&self) -> Option<Vec<u8>> {
        self.sealed.as_ref().map(|sealed| sealed.to_bytes())
    }
}
