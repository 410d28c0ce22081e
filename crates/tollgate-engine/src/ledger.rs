//! In-memory payment ledger with write-through persistence.
//!
//! Every lifecycle mutation happens under the record's map entry lock and is
//! written to the [`RecordStore`] before the lock is released. If the store
//! write fails the in-memory mutation is rolled back, so memory and disk
//! never disagree about a record's status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tollgate_core::{
    Address, LifecycleEvent, PaymentLifecycle, PaymentRecord, PaymentStatus, TxHash, Wei,
};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::store::RecordStore;

/// Outcome of recording one balance observation.
#[derive(Debug)]
pub enum PollOutcome {
    /// No deposit yet; keep polling.
    NoDeposit,
    /// This observation won the detection test-and-set. The caller owns the
    /// follow-up work: emit the event, notify, sweep. Carries a snapshot of
    /// the record taken under the entry lock.
    Detected(PaymentRecord),
    /// The record already left `Active`; a previous observation was first.
    AlreadyHandled,
    /// The payment window has elapsed; the observation was discarded.
    Expired,
}

/// Public view of a payment's progress, as reported to merchants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A positive balance was observed inside the window.
    Confirmed { balance: Wei },
    /// Still inside the window with no deposit seen.
    Pending,
    /// The payment window has elapsed.
    Expired,
    /// The address was never issued by this node.
    Unknown,
}

/// Tracks every issued payment address and serializes its lifecycle
/// transitions.
pub struct PaymentLedger {
    records: DashMap<Address, PaymentRecord>,
    store: Arc<dyn RecordStore>,
}

impl PaymentLedger {
    /// Opens the ledger over a store, rebuilding the in-memory map from
    /// whatever the store holds.
    pub fn open(store: Arc<dyn RecordStore>) -> Result<Self, LedgerError> {
        let records = DashMap::new();
        for record in store.load_all()? {
            records.insert(record.address, record);
        }
        info!(count = records.len(), "payment ledger loaded");
        Ok(Self { records, store })
    }

    /// Registers a freshly issued record. The store write happens before the
    /// record becomes visible to polling.
    pub fn insert(&self, record: PaymentRecord) -> Result<(), LedgerError> {
        match self.records.entry(record.address) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(LedgerError::AlreadyExists(record.address))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                self.store.put(&record)?;
                slot.insert(record);
                Ok(())
            }
        }
    }

    pub fn get(&self, address: Address) -> Option<PaymentRecord> {
        self.records.get(&address).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Addresses that should be polled this tick: `Active` and still inside
    /// their payment window.
    pub fn pollable(&self, now: DateTime<Utc>) -> Vec<Address> {
        self.records
            .iter()
            .filter(|entry| entry.pollable_at(now))
            .map(|entry| entry.address)
            .collect()
    }

    /// Addresses currently in the given status. Used at startup to surface
    /// records that were mid-sweep when the previous process died.
    pub fn addresses_in(&self, status: PaymentStatus) -> Vec<Address> {
        self.records
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.address)
            .collect()
    }

    /// Records one balance observation for an address.
    ///
    /// The detection test-and-set lives here: the first positive observation
    /// against an `Active`, unexpired record flips `invoice_sent`, moves the
    /// record to `Detected`, persists it, and returns
    /// [`PollOutcome::Detected`]. Every concurrent or later observation gets
    /// a non-detected outcome, which is what makes downstream notification
    /// exactly-once.
    pub fn record_poll(
        &self,
        address: Address,
        balance: Wei,
        now: DateTime<Utc>,
    ) -> Result<PollOutcome, LedgerError> {
        let mut entry = self
            .records
            .get_mut(&address)
            .ok_or(LedgerError::NotFound(address))?;
        let record = entry.value_mut();

        if record.status != PaymentStatus::Active {
            return Ok(PollOutcome::AlreadyHandled);
        }
        if record.is_expired_at(now) {
            debug!(address = %address, "observation discarded, payment window elapsed");
            return Ok(PollOutcome::Expired);
        }

        let previous_balance = record.observed_balance;
        record.observed_balance = balance;

        if !balance.is_zero() && !record.invoice_sent {
            let new_status =
                PaymentLifecycle::transition(record.status, LifecycleEvent::BalanceObserved)?;
            record.invoice_sent = true;
            record.status = new_status;
            if let Err(e) = self.store.put(record) {
                record.invoice_sent = false;
                record.status = PaymentStatus::Active;
                record.observed_balance = previous_balance;
                return Err(e.into());
            }
            info!(address = %address, balance = %balance, "deposit detected");
            return Ok(PollOutcome::Detected(record.clone()));
        }

        if record.observed_balance != previous_balance {
            if let Err(e) = self.store.put(record) {
                record.observed_balance = previous_balance;
                return Err(e.into());
            }
        }
        Ok(PollOutcome::NoDeposit)
    }

    /// Claims a `Detected` record for settling. Exactly one caller wins;
    /// everyone else sees [`LedgerError::WrongStatus`]. Returns a snapshot
    /// including the signing key, taken under the entry lock.
    pub fn begin_settling(&self, address: Address) -> Result<PaymentRecord, LedgerError> {
        let mut entry = self
            .records
            .get_mut(&address)
            .ok_or(LedgerError::NotFound(address))?;
        let record = entry.value_mut();

        if record.status != PaymentStatus::Detected {
            return Err(LedgerError::WrongStatus {
                address,
                status: record.status,
                expected: PaymentStatus::Detected,
            });
        }

        let previous_status = record.status;
        record.status = PaymentLifecycle::transition(record.status, LifecycleEvent::SweepStarted)?;
        if let Err(e) = self.store.put(record) {
            record.status = previous_status;
            return Err(e.into());
        }
        Ok(record.clone())
    }

    /// Marks a settling record as swept and scrubs its signing key. The key
    /// is gone from memory and from the store once this returns.
    pub fn complete_sweep(&self, address: Address, tx_hash: TxHash) -> Result<(), LedgerError> {
        let mut entry = self
            .records
            .get_mut(&address)
            .ok_or(LedgerError::NotFound(address))?;
        let record = entry.value_mut();

        let new_status =
            PaymentLifecycle::transition(record.status, LifecycleEvent::SweepConfirmed)?;
        let previous_status = record.status;
        let previous_key = record.signing_key.take();
        record.status = new_status;
        record.sweep_tx = Some(tx_hash);
        if let Err(e) = self.store.put(record) {
            record.status = previous_status;
            record.signing_key = previous_key;
            record.sweep_tx = None;
            return Err(e.into());
        }
        info!(address = %address, tx = %tx_hash, "payment swept");
        Ok(())
    }

    /// Returns a settling record to `Detected` after a failed sweep attempt,
    /// so the funds stay claimable.
    pub fn revert_to_detected(&self, address: Address) -> Result<(), LedgerError> {
        let mut entry = self
            .records
            .get_mut(&address)
            .ok_or(LedgerError::NotFound(address))?;
        let record = entry.value_mut();

        let previous_status = record.status;
        record.status = PaymentLifecycle::transition(record.status, LifecycleEvent::SweepFailed)?;
        if let Err(e) = self.store.put(record) {
            record.status = previous_status;
            return Err(e.into());
        }
        debug!(address = %address, "record returned to detected after sweep failure");
        Ok(())
    }

    /// Overwrites the observed balance of a `Detected` record with a fresh
    /// chain reading. Only the operator retry path uses this.
    pub fn set_observed_balance(&self, address: Address, balance: Wei) -> Result<(), LedgerError> {
        let mut entry = self
            .records
            .get_mut(&address)
            .ok_or(LedgerError::NotFound(address))?;
        let record = entry.value_mut();

        if record.status != PaymentStatus::Detected {
            return Err(LedgerError::WrongStatus {
                address,
                status: record.status,
                expected: PaymentStatus::Detected,
            });
        }

        let previous_balance = record.observed_balance;
        record.observed_balance = balance;
        if record.observed_balance != previous_balance {
            if let Err(e) = self.store.put(record) {
                record.observed_balance = previous_balance;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Merchant-facing status check. Expiry is judged on the clock alone so
    /// callers get a stable answer even if the poller has not visited the
    /// record yet.
    pub fn check(&self, address: Address, now: DateTime<Utc>) -> CheckOutcome {
        let Some(record) = self.get(address) else {
            return CheckOutcome::Unknown;
        };
        if record.is_expired_at(now) {
            return CheckOutcome::Expired;
        }
        if record.invoice_sent {
            CheckOutcome::Confirmed {
                balance: record.observed_balance,
            }
        } else {
            CheckOutcome::Pending
        }
    }
}
