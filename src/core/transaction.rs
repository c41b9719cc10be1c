//! Signed value-transfer transactions.

use crate::crypto::key_pair::{PrivateKey, PublicKey};
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use crate::types::signature::SerializableSignature;
use chainsync_derive::BinaryCodec;

/// A signed transfer of native currency between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct Transaction {
    /// Recipient account.
    pub to: Address,
    /// Native token amount transferred to the recipient.
    pub amount: u128,
    /// Price per gas unit offered by the sender.
    pub gas_price: u64,
    /// Monotonic counter preventing replay for this sender.
    pub nonce: u64,
    /// Sender's public key, also used for signature verification.
    pub from: PublicKey,
    /// Schnorr signature over the signing hash.
    pub signature: SerializableSignature,
}

impl Transaction {
    /// Creates a signed transfer.
    pub fn new(to: Address, amount: u128, gas_price: u64, nonce: u64, key: &PrivateKey) -> Self {
        let from = key.public_key();
        let signing_hash = Self::signing_hash(&from, &to, amount, gas_price, nonce);
        Transaction {
            to,
            amount,
            gas_price,
            nonce,
            from,
            signature: key.sign(signing_hash.as_slice()),
        }
    }

    fn signing_hash(
        from: &PublicKey,
        to: &Address,
        amount: u128,
        gas_price: u64,
        nonce: u64,
    ) -> Hash {
        let mut hasher = Hash::sha3();
        hasher.update(b"TX");
        from.encode(&mut hasher);
        to.encode(&mut hasher);
        amount.encode(&mut hasher);
        gas_price.encode(&mut hasher);
        nonce.encode(&mut hasher);
        hasher.finalize()
    }

    /// Content hash identifying this transaction.
    pub fn id(&self) -> Hash {
        let mut hasher = Hash::sha3();
        hasher.update(b"TX_ID");
        self.encode(&mut hasher);
        hasher.finalize()
    }

    /// Address derived from the sender's public key.
    pub fn sender(&self) -> Address {
        self.from.address
    }

    /// Checks the sender's signature over the transaction payload.
    pub fn verify(&self) -> bool {
        let signing_hash =
            Self::signing_hash(&self.from, &self.to, self.amount, self.gas_price, self.nonce);
        self.from.verify(signing_hash.as_slice(), self.signature)
    }
}

/// Root commitment over an ordered transaction list: the content hash of its
/// canonical encoding. Order matters.
pub fn transactions_root(transactions: &[Transaction]) -> Hash {
    let mut hasher = Hash::sha3();
    hasher.update(b"TRANSACTIONS");
    transactions.len().encode(&mut hasher);
    for tx in transactions {
        tx.encode(&mut hasher);
    }
    hasher.finalize()
}
