//! Schnorr signature key pairs on secp256k1.

use crate::types::address::{Address, ADDRESS_LEN};
use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use crate::types::signature::SerializableSignature;
use k256::ecdsa::signature::Signer;
use k256::schnorr::signature::Verifier;
use k256::schnorr::{SigningKey, VerifyingKey};
use rand_core::OsRng;
use sha3::{Digest, Sha3_256};

/// Private key for signing transactions and seals.
///
/// Generated from OS entropy. Never serialized as part of any wire format.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

/// Public key for signature verification and address derivation.
///
/// The address is SHA3-256 of the verifying key, last 20 bytes. `Copy` on
/// purpose: public keys are passed constantly during validation and stack
/// allocation keeps them cache-friendly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    pub key: VerifyingKey,
    pub address: Address,
}

impl PrivateKey {
    /// Generates a random private key from OS entropy.
    pub fn new() -> Self {
        let mut rng = OsRng;
        Self {
            key: SigningKey::random(&mut rng),
        }
    }

    /// Creates a private key from raw bytes.
    ///
    /// Returns `None` if the bytes are not a valid secp256k1 scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        SigningKey::from_bytes(bytes).ok().map(|key| Self { key })
    }

    /// Raw private key bytes, as accepted by engine key options.
    ///
    /// **Security**: never log or transmit these.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes().into()
    }

    /// Derives the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(self)
    }

    /// Signs arbitrary data, producing a Schnorr signature.
    pub fn sign(&self, data: &[u8]) -> SerializableSignature {
        SerializableSignature(self.key.sign(data))
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_address(key: &VerifyingKey) -> Address {
    let mut hasher = Sha3_256::new();
    hasher.update(key.to_bytes());
    let full: [u8; 32] = hasher.finalize().into();

    let mut addr = [0u8; ADDRESS_LEN];
    addr.copy_from_slice(&full[12..]);
    Address(addr)
}

impl PublicKey {
    /// Derives a public key from a private key and computes its address.
    pub(crate) fn new(private: &PrivateKey) -> Self {
        let key = *private.key.verifying_key();
        PublicKey {
            key,
            address: derive_address(&key),
        }
    }

    /// Verifies a Schnorr signature against the given data.
    pub fn verify(&self, data: &[u8], signature: SerializableSignature) -> bool {
        self.key.verify(data, &signature.0).is_ok()
    }
}

impl Encode for PublicKey {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&self.key.to_bytes());
    }
}

impl Decode for PublicKey {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let key_bytes = <[u8; 32]>::decode(input)?;
        let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| DecodeError::InvalidValue)?;
        Ok(PublicKey {
            key,
            address: derive_address(&key),
        })
    }
}
