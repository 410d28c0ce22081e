use rlp::RlpStream;

use tollgate_core::{keccak256, Address, TxHash, Wei};

use crate::error::CryptoError;
use crate::keys::KeyPair;

/// A plain native-coin transfer using legacy gas fields, signed with
/// replay protection (`v = chain_id * 2 + 35 + recovery_id`).
#[derive(Debug, Clone)]
pub struct TransferTransaction {
    pub nonce: u64,
    pub gas_price: Wei,
    pub gas_limit: u64,
    pub to: Address,
    pub value: Wei,
    pub chain_id: u64,
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// RLP-encoded signed transaction bytes.
    pub raw: Vec<u8>,
    /// Transaction hash (Keccak-256 of the raw bytes).
    pub hash: TxHash,
}

impl TransferTransaction {
    /// The digest the sender signs: Keccak-256 of the RLP list
    /// `(nonce, gas_price, gas_limit, to, value, data, chain_id, 0, 0)`.
    pub fn sighash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&uint_bytes(self.chain_id as u128));
        stream.append(&Vec::<u8>::new());
        stream.append(&Vec::<u8>::new());
        keccak256(&stream.out())
    }

    /// Sign the transfer and RLP-encode the result for broadcast.
    pub fn sign(&self, keypair: &KeyPair) -> Result<SignedTransaction, CryptoError> {
        let digest = self.sighash();
        let (signature, recovery_id) = keypair
            .signing_key()
            .sign_prehash_recoverable(&digest)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;
        let (r, s) = signature.split_bytes();
        let v = self.chain_id * 2 + 35 + recovery_id.to_byte() as u64;

        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&uint_bytes(v as u128));
        stream.append(&trim_leading_zeros(&r));
        stream.append(&trim_leading_zeros(&s));

        let raw = stream.out().to_vec();
        let hash = TxHash::new(keccak256(&raw));
        Ok(SignedTransaction { raw, hash })
    }

    /// The first six RLP items, shared by the sighash payload and the
    /// signed encoding. A plain transfer carries no calldata.
    fn append_body(&self, stream: &mut RlpStream) {
        stream.append(&uint_bytes(self.nonce as u128));
        stream.append(&uint_bytes(self.gas_price.value()));
        stream.append(&uint_bytes(self.gas_limit as u128));
        stream.append(&self.to.as_bytes().to_vec());
        stream.append(&uint_bytes(self.value.value()));
        stream.append(&Vec::<u8>::new());
    }
}

/// RLP quantity encoding: big-endian with leading zeros stripped;
/// zero encodes as the empty byte string.
fn uint_bytes(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}
