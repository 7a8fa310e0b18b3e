use std::path::Path;
use std::sync::{Arc, Mutex};

use kubedeck_kv::{KVStore, RedbStore};
use tracing::debug;

use crate::error::StoreError;
use crate::tx::Transaction;

/// Handle to the record store. Cheap to share behind an `Arc`.
///
/// Read transactions run concurrently. Write transactions are serialized by
/// a store-wide writer lock held until commit or rollback, so a
/// read-then-write inside one write transaction cannot interleave with
/// another writer.
pub struct Store {
    kv: Arc<dyn KVStore>,
    writer: Mutex<()>,
}

impl Store {
    /// Wrap an existing KV backend.
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self {
            kv,
            writer: Mutex::new(()),
        }
    }

    /// Open or create a redb-backed store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let kv = RedbStore::open(path)?;
        Ok(Self::new(Arc::new(kv)))
    }

    /// Begin a transaction. Writes on a read transaction fail with
    /// `StoreError::ReadOnly`.
    pub fn begin(&self, writable: bool) -> Result<Transaction<'_>, StoreError> {
        if !writable {
            return Transaction::new(self.kv.as_ref(), None);
        }
        let guard = self
            .writer
            .lock()
            .map_err(|_| StoreError::Storage("writer lock poisoned".into()))?;
        debug!("store: write transaction started");
        Transaction::new(self.kv.as_ref(), Some(guard))
    }
}
