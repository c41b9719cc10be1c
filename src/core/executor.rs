//! Transaction execution against the world state.

use crate::core::account::Account;
use crate::core::receipt::Receipt;
use crate::core::transaction::Transaction;
use crate::state::account_state::AccountState;
use crate::state::trie::TrieError;
use crate::types::address::Address;
use crate::types::hash::Hash;
use chainsync_derive::Error;

/// Gas charged for a native transfer.
pub const TRANSFER_GAS: u64 = 21_000;

/// Block-level context handed to the executor alongside each transaction.
#[derive(Clone, Debug)]
pub struct EnvInfo {
    /// Height of the block being built or validated.
    pub number: u64,
    pub timestamp: u64,
    /// Account credited with transaction fees.
    pub beneficiary: Address,
    /// Recent ancestor hashes, newest first.
    pub last_hashes: Vec<Hash>,
}

/// Reasons a transaction fails to execute.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("invalid transaction signature")]
    InvalidSignature,
    #[error("bad nonce: expected {expected}, got {actual}")]
    BadNonce { expected: u64, actual: u64 },
    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance { balance: u128, required: u128 },
    #[error("balance overflow")]
    BalanceOverflow,
    #[error("sender account {0} does not exist")]
    MissingSender(Address),
    #[error("state access failed: {0}")]
    State(TrieError),
}

impl From<TrieError> for ExecutionError {
    fn from(err: TrieError) -> Self {
        ExecutionError::State(err)
    }
}

/// Applies one transaction to a state view, producing its receipt.
///
/// Implementations must be deterministic: import re-executes blocks through
/// the same trait and compares the resulting roots against the header.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        state: &mut AccountState<'_>,
        env: &EnvInfo,
        tx: &Transaction,
    ) -> Result<Receipt, ExecutionError>;
}

/// Native value-transfer execution.
///
/// Checks the signature, nonce, and balance, moves the amount, bumps the
/// sender's nonce, and credits the fixed gas fee to the block beneficiary.
/// Returns the receipt with `cumulative_gas_used` equal to this
/// transaction's own gas; the block accumulates the running total.
pub struct TransferExecutor;

impl Executor for TransferExecutor {
    fn execute(
        &self,
        state: &mut AccountState<'_>,
        env: &EnvInfo,
        tx: &Transaction,
    ) -> Result<Receipt, ExecutionError> {
        if !tx.verify() {
            return Err(ExecutionError::InvalidSignature);
        }

        let sender_address = tx.sender();
        let mut sender = state
            .get_account(&sender_address)?
            .ok_or(ExecutionError::MissingSender(sender_address))?;

        if sender.nonce() != tx.nonce {
            return Err(ExecutionError::BadNonce {
                expected: sender.nonce(),
                actual: tx.nonce,
            });
        }

        let fee = u128::from(TRANSFER_GAS) * u128::from(tx.gas_price);
        let required = tx
            .amount
            .checked_add(fee)
            .ok_or(ExecutionError::BalanceOverflow)?;

        sender.charge(required)?;
        sender.increment_nonce();
        state.set_account(&sender_address, &sender)?;

        // Re-read so a self-transfer credits the already-debited account.
        let mut recipient = state
            .get_account(&tx.to)?
            .unwrap_or_else(|| Account::new(0));
        recipient.credit(tx.amount)?;
        state.set_account(&tx.to, &recipient)?;

        if fee > 0 {
            let mut beneficiary = state
                .get_account(&env.beneficiary)?
                .unwrap_or_else(|| Account::new(0));
            beneficiary.credit(fee)?;
            state.set_account(&env.beneficiary, &beneficiary)?;
        }

        Ok(Receipt {
            tx_hash: tx.id(),
            success: true,
            gas_used: TRANSFER_GAS,
            cumulative_gas_used: TRANSFER_GAS,
        })
    }
}
