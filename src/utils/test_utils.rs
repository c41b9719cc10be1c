//! Shared test helpers.

#[cfg(test)]
pub mod utils {
    use crate::core::account::Account;
    use crate::core::genesis::Genesis;
    use crate::crypto::key_pair::PrivateKey;
    use crate::types::address::Address;
    use crate::types::hash::{Hash, HASH_LEN};
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(1);

    /// Process-unique hash for tests that need distinct node keys.
    pub fn random_hash() -> Hash {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut value = [0u8; HASH_LEN];
        value[..8].copy_from_slice(&n.to_le_bytes());
        Hash(value)
    }

    /// Fresh keypair plus its derived address.
    pub fn funded_key() -> (PrivateKey, Address) {
        let key = PrivateKey::new();
        let address = key.public_key().address;
        (key, address)
    }

    /// Development genesis crediting the given balances.
    pub fn dev_genesis(accounts: &[(Address, u128)]) -> Genesis {
        Genesis::dev(
            accounts
                .iter()
                .map(|(address, balance)| (*address, Account::new(*balance)))
                .collect(),
        )
    }
}
