//! Durable persistence seam for payment records.
//!
//! The ledger writes through to a [`RecordStore`] before it acknowledges any
//! state change, so a crash never loses an issued address or a lifecycle
//! step. The node wires in a RocksDB-backed implementation; tests use
//! [`MemoryStore`].

use dashmap::DashMap;
use tollgate_core::{Address, PaymentRecord};

use crate::error::StoreError;

/// Storage backend for payment records, keyed by payment address.
pub trait RecordStore: Send + Sync {
    /// Durably persist one record, replacing any previous version.
    fn put(&self, record: &PaymentRecord) -> Result<(), StoreError>;

    /// Fetch one record.
    fn get(&self, address: Address) -> Result<Option<PaymentRecord>, StoreError>;

    /// Load every stored record. Called once at startup to rebuild the
    /// in-memory ledger.
    fn load_all(&self) -> Result<Vec<PaymentRecord>, StoreError>;
}

/// In-memory store. Holds records as serialized JSON so tests exercise the
/// same encode/decode path a disk-backed store does.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<Address, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn put(&self, record: &PaymentRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        self.records.insert(record.address, bytes);
        Ok(())
    }

    fn get(&self, address: Address) -> Result<Option<PaymentRecord>, StoreError> {
        match self.records.get(&address) {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load_all(&self) -> Result<Vec<PaymentRecord>, StoreError> {
        let mut records = Vec::with_capacity(self.records.len());
        for entry in self.records.iter() {
            records.push(serde_json::from_slice(&entry)?);
        }
        Ok(records)
    }
}
