use chrono::SecondsFormat;
use serde::Serialize;

/// One window of a filtered listing.
///
/// `total` is the size of the whole filtered set, independent of how many
/// items the window returned.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T: Serialize> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    /// Convert the items while keeping the total.
    pub fn map<U: Serialize, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Generate a new random ID (UUIDv4, no dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Get the current time as an RFC 3339 string.
///
/// Fixed microsecond precision with a `Z` suffix, so timestamps sort
/// lexicographically in creation order.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
