//! Payment address issuance.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tollgate_core::{Address, PaymentRecord, Wei};
use tollgate_crypto::KeyPair;
use tracing::info;

use crate::error::IssueError;
use crate::ledger::PaymentLedger;

/// What the caller gets back from issuance. The signing key stays inside the
/// ledger and is deliberately absent from this type.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedPayment {
    pub address: Address,
    pub expires_at: DateTime<Utc>,
}

/// Creates fresh single-use deposit addresses and registers them with the
/// ledger.
pub struct AddressIssuer {
    ledger: Arc<PaymentLedger>,
    window: Duration,
}

impl AddressIssuer {
    pub fn new(ledger: Arc<PaymentLedger>, window: Duration) -> Self {
        Self { ledger, window }
    }

    /// Issues a new payment address for the given expected amount.
    ///
    /// The record is durably stored before the address is returned, so a
    /// crash between issuance and the merchant's first status check cannot
    /// orphan a deposit.
    pub fn issue(&self, expected_amount: Wei) -> Result<IssuedPayment, IssueError> {
        if expected_amount.is_zero() {
            return Err(IssueError::InvalidAmount(
                "expected amount must be positive".into(),
            ));
        }

        let keypair = KeyPair::generate();
        let address = keypair.address();
        let record = PaymentRecord::new(
            address,
            keypair.key_material(),
            expected_amount,
            Utc::now(),
            self.window,
        );
        let expires_at = record.expires_at;
        self.ledger.insert(record)?;

        info!(address = %address, amount = %expected_amount, "payment address issued");
        Ok(IssuedPayment {
            address,
            expires_at,
        })
    }
}
