//! Transaction execution receipts.
//!
//! Each executed transaction produces a [`Receipt`] recording its outcome.
//! Receipts are committed with their block; the root commitment over the
//! ordered list is stored in the block header and is what a light client
//! checks when it accepts receipts it did not compute.

use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use chainsync_derive::BinaryCodec;

/// Record of a single transaction's execution result within a block.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Receipt {
    /// Hash of the transaction that produced this receipt.
    pub tx_hash: Hash,
    /// Whether the transaction executed successfully.
    pub success: bool,
    /// Gas consumed by this individual transaction.
    pub gas_used: u64,
    /// Running total of gas consumed up to and including this transaction.
    pub cumulative_gas_used: u64,
}

impl Receipt {
    /// Domain-separated hash of this receipt.
    pub fn hash(&self) -> Hash {
        let mut h = Hash::sha3();
        h.update(b"RECEIPT");
        self.encode(&mut h);
        h.finalize()
    }
}

/// Root commitment over an ordered receipt list: the content hash of its
/// canonical encoding. Order matters.
pub fn receipts_root(receipts: &[Receipt]) -> Hash {
    let mut hasher = Hash::sha3();
    hasher.update(b"RECEIPTS");
    receipts.len().encode(&mut hasher);
    for receipt in receipts {
        receipt.encode(&mut hasher);
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::Decode;

    fn sample_receipt() -> Receipt {
        Receipt {
            tx_hash: Hash::sha3().chain(b"tx1").finalize(),
            success: true,
            gas_used: 21_000,
            cumulative_gas_used: 21_000,
        }
    }

    #[test]
    fn receipt_encode_decode_roundtrip() {
        let receipt = sample_receipt();
        let decoded = Receipt::from_bytes(&receipt.to_bytes()).expect("decode failed");
        assert_eq!(receipt, decoded);
    }

    #[test]
    fn receipt_hash_domain_separated() {
        let receipt = sample_receipt();

        let mut h = Hash::sha3();
        receipt.encode(&mut h);
        assert_ne!(receipt.hash(), h.finalize());
    }

    #[test]
    fn root_depends_on_content_and_order() {
        let a = sample_receipt();
        let mut b = sample_receipt();
        b.gas_used += 1;

        assert_ne!(receipts_root(&[]), receipts_root(&[a.clone()]));
        assert_ne!(
            receipts_root(&[a.clone(), b.clone()]),
            receipts_root(&[b, a])
        );
    }

    #[test]
    fn root_is_deterministic() {
        let receipts = vec![sample_receipt(), sample_receipt()];
        assert_eq!(receipts_root(&receipts), receipts_root(&receipts));
    }
}
