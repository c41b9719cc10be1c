//! Encodable wrapper around a Schnorr signature.

use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use k256::schnorr::Signature;

/// Signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Newtype over [`k256::schnorr::Signature`] carrying the binary codec the
/// upstream type lacks. Signatures travel as their fixed 64-byte form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializableSignature(pub Signature);

impl Encode for SerializableSignature {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&self.0.to_bytes());
    }
}

impl Decode for SerializableSignature {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = <[u8; SIGNATURE_LEN]>::decode(input)?;
        let signature =
            Signature::try_from(bytes.as_slice()).map_err(|_| DecodeError::InvalidValue)?;
        Ok(SerializableSignature(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_pair::PrivateKey;

    #[test]
    fn round_trips_as_64_bytes() {
        let signature = PrivateKey::new().sign(b"payload");
        let bytes = signature.to_bytes();
        assert_eq!(bytes.len(), SIGNATURE_LEN);
        assert_eq!(SerializableSignature::from_bytes(&bytes), Ok(signature));
    }

    #[test]
    fn junk_bytes_fail_to_decode() {
        let bytes = [0u8; SIGNATURE_LEN];
        assert!(SerializableSignature::from_bytes(&bytes).is_err());
    }
}
