use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use zeroize::Zeroize;

use tollgate_core::{keccak256, Address, KeyMaterial};

use crate::error::CryptoError;

/// secp256k1 key pair owning the signing key for one receiving address.
/// The underlying scalar is zeroized on drop by the curve implementation.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair using OS-provided entropy.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self { signing_key }
    }

    /// Create a key pair from raw bytes (32 bytes).
    /// Rejects byte strings that are not a valid curve scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidKeyMaterial("not a valid curve scalar".into()))?;
        Ok(Self { signing_key })
    }

    /// Reconstruct a key pair from stored record key material.
    pub fn from_key_material(key: &KeyMaterial) -> Result<Self, CryptoError> {
        Self::from_bytes(key.expose())
    }

    /// Export the secret as record key material for storage.
    pub fn key_material(&self) -> KeyMaterial {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        let material = KeyMaterial::new(bytes);
        bytes.zeroize();
        material
    }

    /// Derive the account address: the last 20 bytes of the Keccak-256
    /// digest of the uncompressed public key (without the 0x04 tag).
    pub fn address(&self) -> Address {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let digest = keccak256(&point.as_bytes()[1..]);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&digest[12..]);
        Address::new(addr)
    }

    /// Access the underlying signing key for transaction signing.
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}
