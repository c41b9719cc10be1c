//! 20-byte account addresses derived from public keys.

use chainsync_derive::BinaryCodec;
use std::fmt;

/// Address length in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Fixed-size 20-byte address identifying an account.
///
/// Derived from a public key via SHA3-256, taking the last 20 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Ord, PartialOrd, BinaryCodec)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// All-zero address, used where no beneficiary applies.
    pub fn zero() -> Address {
        Address([0u8; ADDRESS_LEN])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
