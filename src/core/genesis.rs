//! Deterministic genesis derivation.

use crate::core::account::Account;
use crate::core::block::Header;
use crate::core::receipt::receipts_root;
use crate::core::transaction::transactions_root;
use crate::state::account_state::AccountState;
use crate::state::content_store::NodeStore;
use crate::state::trie::TrieError;
use crate::types::address::Address;
use crate::types::hash::Hash;

/// Genesis configuration: initial allocations and header fields.
///
/// Two chains built from equal configurations share the same genesis hash,
/// which is what lets a light client insert blocks produced elsewhere.
#[derive(Clone, Debug)]
pub struct Genesis {
    pub accounts: Vec<(Address, Account)>,
    pub timestamp: u64,
    pub extra_data: Vec<u8>,
}

impl Genesis {
    /// Development genesis with the given allocations and a fixed timestamp.
    pub fn dev(accounts: Vec<(Address, Account)>) -> Self {
        Self {
            accounts,
            timestamp: 0,
            extra_data: b"dev".to_vec(),
        }
    }

    /// Writes the genesis state trie into `store` and derives the genesis
    /// header. Allocation order does not affect the resulting root.
    pub fn build(&self, store: &dyn NodeStore) -> Result<Header, TrieError> {
        let mut accounts = self.accounts.clone();
        accounts.sort_unstable_by_key(|(address, _)| *address);

        let mut state = AccountState::new(store, Hash::zero());
        for (address, account) in &accounts {
            state.set_account(address, account)?;
        }

        Ok(Header {
            parent_hash: Hash::zero(),
            number: 0,
            timestamp: self.timestamp,
            beneficiary: Address::zero(),
            state_root: state.root(),
            transactions_root: transactions_root(&[]),
            receipts_root: receipts_root(&[]),
            gas_used: 0,
            difficulty: 0,
            extra_data: self.extra_data.clone(),
            seal: Vec::new(),
        })
    }
}
