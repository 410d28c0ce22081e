use thiserror::Error;
use tollgate_chain::ChainError;
use tollgate_core::{Address, CoreError, PaymentStatus, Wei};

/// Errors from the durable record store backing the ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("unknown payment address: {0}")]
    NotFound(Address),

    #[error("payment address already issued: {0}")]
    AlreadyExists(Address),

    #[error("record {address} is {status}, expected {expected}")]
    WrongStatus {
        address: Address,
        status: PaymentStatus,
        expected: PaymentStatus,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from address issuance.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors from the sweep path. Every failure after the record has been
/// claimed for settling reverts it to `Detected` so a later attempt can
/// pick it up again.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("unknown payment address: {0}")]
    NotFound(Address),

    /// Another task already claimed this record for settling.
    #[error("sweep already in progress for {0}")]
    AlreadySettling(Address),

    #[error("record {address} is {status} and cannot be swept")]
    NotSweepable {
        address: Address,
        status: PaymentStatus,
    },

    #[error("balance {balance} cannot cover the fee reserve {fee_reserve}")]
    InsufficientFunds { balance: Wei, fee_reserve: Wei },

    #[error("fee reserve overflows: gas limit {gas_limit} at gas price {gas_price}")]
    FeeOverflow { gas_limit: u64, gas_price: Wei },

    /// The stored key material is missing or no longer yields a usable
    /// signing key. Operator intervention is required; the funds stay
    /// attributed to the record.
    #[error("signing key for {0} is missing or unusable")]
    KeyUnrecoverable(Address),

    #[error("failed to sign sweep transaction: {0}")]
    SignTransactionFailed(String),

    #[error("failed to broadcast sweep transaction: {0}")]
    BroadcastFailed(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors from notification delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}
