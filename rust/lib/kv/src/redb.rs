use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::KVError;
use crate::traits::{KVSnapshot, KVStore, WriteOp};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

fn storage<E: std::fmt::Display>(e: E) -> KVError {
    KVError::Storage(e.to_string())
}

/// RedbStore is a KVStore implementation backed by redb, a pure-Rust embedded
/// key-value database.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(storage)?;

        // Ensure the table exists by doing a write transaction.
        let write_txn = db.begin_write().map_err(storage)?;
        {
            let _table = write_txn.open_table(TABLE).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;

        debug!("RedbStore: opened {:?}", path);
        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a read snapshot.
    pub fn read(&self) -> Result<RedbSnapshot, KVError> {
        let txn = self.db.begin_read().map_err(storage)?;
        Ok(RedbSnapshot { txn })
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        self.read()?.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.apply(&[WriteOp::Put {
            key: key.to_string(),
            value: value.to_vec(),
        }])
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        self.apply(&[WriteOp::Delete {
            key: key.to_string(),
        }])
    }

    fn apply(&self, ops: &[WriteOp]) -> Result<(), KVError> {
        if ops.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage)?;
            for op in ops {
                match op {
                    WriteOp::Put { key, value } => {
                        table
                            .insert(key.as_str(), value.as_slice())
                            .map_err(storage)?;
                    }
                    WriteOp::Delete { key } => {
                        table.remove(key.as_str()).map_err(storage)?;
                    }
                }
            }
        }
        // Dropping an uncommitted WriteTransaction aborts it, so an error
        // above leaves the database untouched.
        write_txn.commit().map_err(storage)?;
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        self.read()?.scan(prefix)
    }

    fn snapshot(&self) -> Result<Box<dyn KVSnapshot + '_>, KVError> {
        Ok(Box::new(self.read()?))
    }
}

/// One redb read transaction. Every read through it sees the same state.
pub struct RedbSnapshot {
    txn: ReadTransaction,
}

impl KVSnapshot for RedbSnapshot {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let table = self.txn.open_table(TABLE).map_err(storage)?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(storage(e)),
        }
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let table = self.txn.open_table(TABLE).map_err(storage)?;

        let mut results = Vec::new();
        let iter = table.range(prefix..).map_err(storage)?;

        for entry in iter {
            let entry = entry.map_err(storage)?;
            let key = entry.0.value().to_string();
            if !key.starts_with(prefix) {
                break;
            }
            let value = entry.1.value().to_vec();
            results.push((key, value));
        }

        Ok(results)
    }
}
