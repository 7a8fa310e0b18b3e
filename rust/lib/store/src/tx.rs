use std::collections::BTreeMap;
use std::sync::MutexGuard;

use kubedeck_kv::{KVSnapshot, KVStore, WriteOp};
use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;
use crate::matcher::Matcher;
use crate::query::Query;
use crate::record::{bucket_prefix, record_key, Record};

/// A unit of work over the record store.
///
/// Writes are staged in memory and become visible to this transaction's own
/// reads immediately. `commit` applies the stage as one atomic KV batch;
/// `rollback`, or dropping the transaction uncommitted, discards it.
///
/// All reads go through one KV snapshot taken when the transaction begins,
/// so writes committed elsewhere afterwards are not visible to it.
pub struct Transaction<'s> {
    kv: &'s dyn KVStore,
    snapshot: Box<dyn KVSnapshot + 's>,
    writer: Option<MutexGuard<'s, ()>>,
    /// key -> Some(bytes) for a put, None for a delete.
    staged: BTreeMap<String, Option<Vec<u8>>>,
    finished: bool,
}

impl<'s> Transaction<'s> {
    pub(crate) fn new(
        kv: &'s dyn KVStore,
        writer: Option<MutexGuard<'s, ()>>,
    ) -> Result<Self, StoreError> {
        let snapshot = kv.snapshot()?;
        Ok(Self {
            kv,
            snapshot,
            writer,
            staged: BTreeMap::new(),
            finished: false,
        })
    }

    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    // ── Raw access (stage first, then backend) ──

    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(staged) = self.staged.get(key) {
            return Ok(staged.clone());
        }
        Ok(self.snapshot.get(key)?)
    }

    pub(crate) fn scan_raw(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut merged: BTreeMap<String, Vec<u8>> = self.snapshot.scan(prefix)?.into_iter().collect();
        for (key, value) in self.staged.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match value {
                Some(bytes) => {
                    merged.insert(key.clone(), bytes.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn ensure_writable(&self, what: &str) -> Result<(), StoreError> {
        if self.writer.is_none() {
            return Err(StoreError::ReadOnly(what.to_string()));
        }
        Ok(())
    }

    fn stage_put<T: Record>(&mut self, key: String, record: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        self.staged.insert(key, Some(bytes));
        Ok(())
    }

    // ── Reads ──

    /// Get a record by key value. Returns None if not found.
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError> {
        match self.get_raw(&record_key(T::BUCKET, id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a record or return `StoreError::NotFound`.
    pub fn get_or_err<T: Record>(&self, id: &str) -> Result<T, StoreError> {
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", T::BUCKET, id)))
    }

    /// All records of a bucket, in key order.
    pub fn all<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        self.select(Vec::new()).find()
    }

    /// Start a query; the matchers are AND'ed together.
    pub fn select(&self, matchers: Vec<Matcher>) -> Query<'_, 's> {
        Query::new(self, Matcher::and(matchers))
    }

    /// Raw JSON documents of a bucket, in key order.
    pub(crate) fn documents(&self, bucket: &str) -> Result<Vec<serde_json::Value>, StoreError> {
        self.scan_raw(&bucket_prefix(bucket))?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(StoreError::from))
            .collect()
    }

    // ── Writes ──

    /// Insert a new record. Calls `before_create`; fails with `Conflict`
    /// when the key already exists.
    pub fn save<T: Record>(&mut self, record: &mut T) -> Result<(), StoreError> {
        self.ensure_writable(T::BUCKET)?;
        record.before_create();
        let id = record.key_value();
        let key = record_key(T::BUCKET, &id);
        if self.get_raw(&key)?.is_some() {
            return Err(StoreError::Conflict(format!("{}/{}", T::BUCKET, id)));
        }
        self.stage_put(key, record)
    }

    /// Overwrite an existing record. Calls `before_update`.
    pub fn update<T: Record>(&mut self, record: &mut T) -> Result<(), StoreError> {
        self.ensure_writable(T::BUCKET)?;
        let id = record.key_value();
        let key = record_key(T::BUCKET, &id);
        if self.get_raw(&key)?.is_none() {
            return Err(StoreError::NotFound(format!("{}/{}", T::BUCKET, id)));
        }
        record.before_update();
        self.stage_put(key, record)
    }

    /// Rewrite a single field of the stored copy of `record`, leaving every
    /// other stored field as it is.
    pub fn update_field<T: Record, V: Serialize>(
        &mut self,
        record: &T,
        field: &str,
        value: &V,
    ) -> Result<(), StoreError> {
        self.ensure_writable(T::BUCKET)?;
        let id = record.key_value();
        let key = record_key(T::BUCKET, &id);
        let bytes = self
            .get_raw(&key)?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", T::BUCKET, id)))?;

        let mut doc: serde_json::Value = serde_json::from_slice(&bytes)?;
        let obj = doc.as_object_mut().ok_or_else(|| {
            StoreError::Serialization(format!("{}/{} is not an object", T::BUCKET, id))
        })?;
        obj.insert(field.to_string(), serde_json::to_value(value)?);

        // Make sure the patched document still decodes as T.
        let _: T = serde_json::from_value(doc.clone())?;
        self.staged.insert(key, Some(serde_json::to_vec(&doc)?));
        Ok(())
    }

    /// Delete the stored copy of `record`.
    pub fn delete_struct<T: Record>(&mut self, record: &T) -> Result<(), StoreError> {
        self.ensure_writable(T::BUCKET)?;
        let id = record.key_value();
        let key = record_key(T::BUCKET, &id);
        if self.get_raw(&key)?.is_none() {
            return Err(StoreError::NotFound(format!("{}/{}", T::BUCKET, id)));
        }
        self.staged.insert(key, None);
        Ok(())
    }

    // ── Completion ──

    /// Apply every staged write atomically.
    pub fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        if self.staged.is_empty() {
            return Ok(());
        }
        let ops: Vec<WriteOp> = std::mem::take(&mut self.staged)
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => WriteOp::Put { key, value },
                None => WriteOp::Delete { key },
            })
            .collect();
        debug!("store: committing {} writes", ops.len());
        self.kv.apply(&ops)?;
        Ok(())
    }

    /// Discard every staged write.
    pub fn rollback(mut self) {
        self.finished = true;
        if !self.staged.is_empty() {
            debug!("store: rolled back {} staged writes", self.staged.len());
        }
        self.staged.clear();
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.staged.is_empty() {
            debug!(
                "store: transaction dropped without commit, discarding {} writes",
                self.staged.len()
            );
        }
    }
}
