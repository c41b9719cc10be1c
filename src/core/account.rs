//! Account state persisted in the state trie.

use crate::core::executor::ExecutionError;
use chainsync_derive::BinaryCodec;

/// Canonical account record stored under an address key in the state trie.
///
/// Encoded deterministically, so identical accounts always hash to the same
/// trie node.
#[derive(BinaryCodec, Clone, Debug, PartialEq, Eq)]
pub struct Account {
    /// Monotonic counter of successful transactions from this account.
    nonce: u64,
    /// Spendable balance denominated in the native currency.
    balance: u128,
}

impl Account {
    /// Creates an account with the given balance and a zero nonce.
    pub fn new(balance: u128) -> Self {
        Self { nonce: 0, balance }
    }

    pub fn balance(&self) -> u128 {
        self.balance
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Deducts `amount`, failing without mutation if the balance is short.
    pub fn charge(&mut self, amount: u128) -> Result<(), ExecutionError> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(ExecutionError::InsufficientBalance {
                balance: self.balance,
                required: amount,
            })?;
        Ok(())
    }

    /// Adds `amount`, failing on overflow.
    pub fn credit(&mut self, amount: u128) -> Result<(), ExecutionError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(ExecutionError::BalanceOverflow)?;
        Ok(())
    }

    pub fn increment_nonce(&mut self) {
        self.nonce += 1;
    }
}
