//! Engine event types.
//!
//! These events are emitted by the payment engine so that higher-level
//! components (the HTTP node, log subscribers) can react to payment
//! activity without polling the ledger.

use tokio::sync::broadcast;
use tollgate_core::{Address, TxHash, Wei};

/// High-level events emitted by the payment engine.
#[derive(Debug, Clone)]
pub enum PaymentEvent {
    /// A deposit was detected on an issued address.
    Confirmed {
        /// The issued payment address.
        address: Address,
        /// Balance observed at detection time.
        balance: Wei,
    },

    /// A sweep transaction was accepted by the blockchain node.
    Swept {
        /// The payment address the funds left.
        address: Address,
        /// Hash of the broadcast sweep transaction.
        tx_hash: TxHash,
        /// Amount forwarded to the custodial address, after the fee reserve.
        net_amount: Wei,
    },
}

/// Fan-out channel for [`PaymentEvent`]s. Cloning the bus clones the sender;
/// subscribers that fall behind are dropped by the channel, never blocked on.
#[derive(Clone)]
pub struct EventBus {
    event_tx: broadcast::Sender<PaymentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PaymentEvent> {
        self.event_tx.subscribe()
    }

    /// Emits an event to all current subscribers. A bus with no subscribers
    /// drops the event silently.
    pub fn emit(&self, event: PaymentEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
