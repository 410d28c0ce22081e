//! Notification seam for deposit detections.
//!
//! The scheduler calls the dispatcher exactly once per detection, right
//! after the ledger test-and-set and before the sweep starts. Delivery is
//! best-effort: a failed dispatch is logged and never replayed, and it never
//! rolls back detection state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tollgate_core::{Address, Wei};

use crate::error::NotifyError;

/// Payload handed to dispatchers when a deposit is detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotice {
    pub address: Address,
    pub expected_amount: Wei,
    pub observed_balance: Wei,
    pub detected_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Delivers detection notices to an external receiver.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notice: &PaymentNotice) -> Result<(), NotifyError>;
}

/// Discards every notice. Used when no receiver is configured.
pub struct NullDispatcher;

#[async_trait]
impl NotificationDispatcher for NullDispatcher {
    async fn dispatch(&self, notice: &PaymentNotice) -> Result<(), NotifyError> {
        tracing::debug!(address = %notice.address, "no notification receiver configured");
        Ok(())
    }
}
