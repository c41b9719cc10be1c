//! Account-level view over the state trie.

use crate::core::account::Account;
use crate::state::content_store::NodeStore;
use crate::state::trie::{Trie, TrieError};
use crate::types::address::Address;
use crate::types::encoding::{Decode, Encode};
use crate::types::hash::Hash;

/// Reads and writes accounts against a state root.
///
/// Trie keys are the hash of a domain prefix plus the address, so account
/// keys are uniformly distributed regardless of how addresses cluster.
pub struct AccountState<'a> {
    trie: Trie<'a>,
}

impl<'a> AccountState<'a> {
    pub fn new(store: &'a dyn NodeStore, root: Hash) -> Self {
        Self {
            trie: Trie::new(store, root),
        }
    }

    /// Current state root, updated by every write.
    pub fn root(&self) -> Hash {
        self.trie.root()
    }

    fn storage_key(address: &Address) -> Hash {
        Hash::sha3()
            .chain(b"ACCOUNT")
            .chain(address.as_slice())
            .finalize()
    }

    pub fn get_account(&self, address: &Address) -> Result<Option<Account>, TrieError> {
        match self.trie.get(Self::storage_key(address))? {
            Some(bytes) => Account::from_bytes(&bytes)
                .map(Some)
                .map_err(TrieError::Node),
            None => Ok(None),
        }
    }

    pub fn set_account(&mut self, address: &Address, account: &Account) -> Result<Hash, TrieError> {
        self.trie
            .insert(Self::storage_key(address), account.to_bytes())
    }

    /// Balance of `address`, zero if the account does not exist.
    pub fn balance(&self, address: &Address) -> Result<u128, TrieError> {
        Ok(self
            .get_account(address)?
            .map(|account| account.balance())
            .unwrap_or(0))
    }

    /// Nonce of `address`, zero if the account does not exist.
    pub fn nonce(&self, address: &Address) -> Result<u64, TrieError> {
        Ok(self
            .get_account(address)?
            .map(|account| account.nonce())
            .unwrap_or(0))
    }
}
