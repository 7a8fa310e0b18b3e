use crate::error::KVError;

/// A single write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl WriteOp {
    pub fn key(&self) -> &str {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

/// A consistent point-in-time view of the store. Writes committed after
/// the snapshot was taken are not visible through it.
pub trait KVSnapshot {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Sorted (key, value) pairs under a prefix.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;
}

/// KVStore provides a key-value storage interface.
///
/// Keys follow a namespaced convention: `users:3f2a...`, `role_bindings:...`.
/// The record layer builds transactions on top of `snapshot` + `apply`.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set a key-value pair.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Apply a mixed batch of puts and deletes atomically: either every
    /// operation is visible afterwards or none is.
    fn apply(&self, ops: &[WriteOp]) -> Result<(), KVError>;

    /// Scan all keys matching a prefix. Returns sorted (key, value) pairs.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;

    /// Open a read snapshot shared by every read of one record transaction.
    fn snapshot(&self) -> Result<Box<dyn KVSnapshot + '_>, KVError>;
}
