//! Tollgate payment engine.
//!
//! Owns a payment's whole life: issuance of a fresh deposit address, balance
//! polling against the chain, the single detection event, and the sweep that
//! forwards funds to the custodial address. The engine is transport-agnostic;
//! the HTTP node sits on top of it.

pub mod error;
pub mod events;
pub mod issuer;
pub mod ledger;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod sweep;


pub use error::{IssueError, LedgerError, NotifyError, StoreError, SweepError};
pub use events::{EventBus, PaymentEvent};
pub use issuer::{AddressIssuer, IssuedPayment};
pub use ledger::{CheckOutcome, PaymentLedger, PollOutcome};
pub use notify::{NotificationDispatcher, NullDispatcher, PaymentNotice};
pub use scheduler::{PollingScheduler, ScanSummary};
pub use store::{MemoryStore, RecordStore};
pub use sweep::{SweepConfig, SweepEngine, SweepReceipt};
