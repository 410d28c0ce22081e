pub mod error;
pub mod keys;
pub mod transaction;

pub use error::CryptoError;
pub use keys::KeyPair;
pub use transaction::{SignedTransaction, TransferTransaction};
