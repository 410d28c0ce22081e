use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::key_material::KeyMaterial;
use crate::state_machine::PaymentStatus;
use crate::types::{Address, TxHash, Wei};

/// Default payment window in seconds: how long an issued address is
/// monitored for a deposit before it is considered expired.
pub const DEFAULT_PAYMENT_WINDOW_SECS: u64 = 900;

/// One payment record per issued address. The ledger's unit of storage
/// and of mutual exclusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Receiving address; globally unique ledger key.
    pub address: Address,
    /// Signing key for the eventual sweep. Scrubbed once the record
    /// reaches Swept; `None` afterwards.
    pub signing_key: Option<KeyMaterial>,
    /// Requested payment amount, set at issuance. Immutable.
    pub expected_amount: Wei,
    /// Issuance time.
    pub created_at: DateTime<Utc>,
    /// End of the payment window. Never mutated after creation.
    pub expires_at: DateTime<Utc>,
    /// Set exactly once, monotonic false→true, when a deposit is detected.
    pub invoice_sent: bool,
    /// Lifecycle status.
    pub status: PaymentStatus,
    /// Last balance read by the scheduler.
    pub observed_balance: Wei,
    /// Settlement transaction id, set when the record reaches Swept.
    pub sweep_tx: Option<TxHash>,
}

impl PaymentRecord {
    /// Create a fresh Active record for a newly issued address.
    pub fn new(
        address: Address,
        signing_key: KeyMaterial,
        expected_amount: Wei,
        created_at: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        Self {
            address,
            signing_key: Some(signing_key),
            expected_amount,
            created_at,
            expires_at: created_at + window,
            invoice_sent: false,
            status: PaymentStatus::Active,
            observed_balance: Wei::ZERO,
            sweep_tx: None,
        }
    }

    /// Whether the payment window has elapsed. The boundary instant itself
    /// still counts as inside the window.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the scheduler should query this record's balance.
    pub fn pollable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Active && !self.is_expired_at(now)
    }

    /// The status as seen by readers: a still-Active record past its
    /// window reads as Expired. Expiry is derived, never stored.
    pub fn effective_status_at(&self, now: DateTime<Utc>) -> PaymentStatus {
        if self.status == PaymentStatus::Active && self.is_expired_at(now) {
            PaymentStatus::Expired
        } else {
            self.status
        }
    }
}
