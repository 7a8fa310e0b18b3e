use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait implemented by models to declare how they are persisted.
///
/// Each record lives under `"{BUCKET}:{key_value}"`. Hooks have default
/// no-op impls.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Bucket name, e.g. `"users"`. Must not contain `:`.
    const BUCKET: &'static str;

    /// Extract the key value from this instance.
    fn key_value(&self) -> String;

    /// Called before inserting a new record. Use for auto-fill (id, timestamps).
    fn before_create(&mut self) {}

    /// Called before overwriting an existing record.
    fn before_update(&mut self) {}
}

pub(crate) fn bucket_prefix(bucket: &str) -> String {
    format!("{}:", bucket)
}

pub(crate) fn record_key(bucket: &str, id: &str) -> String {
    format!("{}:{}", bucket, id)
}
