use kubedeck_kv::KVError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("transaction is read-only: {0}")]
    ReadOnly(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<KVError> for StoreError {
    fn from(e: KVError) -> Self {
        match e {
            KVError::Serialization(m) => StoreError::Serialization(m),
            KVError::Storage(m) => StoreError::Storage(m),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Errors from compiling and running a list/search query.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A condition or window could not be compiled. The caller must fix the input.
    #[error("invalid filter: {0}")]
    Filter(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<QueryError> for kubedeck_core::ServiceError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Filter(m) => kubedeck_core::ServiceError::InvalidFilter(m),
            QueryError::Storage(e) => e.into(),
        }
    }
}

impl From<StoreError> for kubedeck_core::ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(m) => kubedeck_core::ServiceError::NotFound(m),
            StoreError::Conflict(m) => kubedeck_core::ServiceError::Conflict(m),
            StoreError::ReadOnly(m) => kubedeck_core::ServiceError::Internal(m),
            StoreError::Storage(m) => kubedeck_core::ServiceError::Storage(m),
            StoreError::Serialization(m) => kubedeck_core::ServiceError::Internal(m),
        }
    }
}
