//! RocksDB-backed record store for the Tollgate node.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use tollgate_core::PaymentRecord;
use tollgate_engine::{RecordStore, StoreError};

const CF_PAYMENTS: &str = "payments";

/// Durable [`RecordStore`] over a RocksDB column family. Keys are the
/// lowercase hex address bytes; values are the JSON-serialized record.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default())];
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    fn payments_cf(&self) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(CF_PAYMENTS)
            .ok_or_else(|| StoreError::Backend(format!("column family '{}' not found", CF_PAYMENTS)))
    }
}

impl RecordStore for RocksStore {
    fn put(&self, record: &PaymentRecord) -> Result<(), StoreError> {
        let cf = self.payments_cf()?;
        let value = serde_json::to_vec(record)?;
        self.db
            .put_cf(cf, record.address.to_hex().as_bytes(), value)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn get(&self, address: tollgate_core::Address) -> Result<Option<PaymentRecord>, StoreError> {
        let cf = self.payments_cf()?;
        let value = self
            .db
            .get_cf(cf, address.to_hex().as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        match value {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load_all(&self) -> Result<Vec<PaymentRecord>, StoreError> {
        let cf = self.payments_cf()?;
        let mut records = Vec::new();
        for entry in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, value) = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}
