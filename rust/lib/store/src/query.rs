use crate::error::StoreError;
use crate::matcher::{compare_values, lookup, Matcher};
use crate::record::Record;
use crate::tx::Transaction;

/// A lazily-executed selection over one bucket.
///
/// Ordering is stable: records with equal sort values keep key order, and
/// `reverse` flips the whole sorted sequence. `skip`/`limit` apply after
/// ordering; `count` ignores them.
pub struct Query<'t, 's> {
    tx: &'t Transaction<'s>,
    matcher: Matcher,
    order_by: Option<String>,
    reverse: bool,
    skip: usize,
    limit: Option<usize>,
}

impl<'t, 's> Query<'t, 's> {
    pub(crate) fn new(tx: &'t Transaction<'s>, matcher: Matcher) -> Self {
        Self {
            tx,
            matcher,
            order_by: None,
            reverse: false,
            skip: 0,
            limit: None,
        }
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    fn matching(&self, bucket: &str) -> Result<Vec<serde_json::Value>, StoreError> {
        Ok(self
            .tx
            .documents(bucket)?
            .into_iter()
            .filter(|doc| self.matcher.matches(doc))
            .collect())
    }

    /// Number of matching records, window ignored.
    pub fn count<T: Record>(&self) -> Result<usize, StoreError> {
        Ok(self.matching(T::BUCKET)?.len())
    }

    /// Matching records, ordered and windowed.
    pub fn find<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        let docs = self.matching(T::BUCKET)?;
        self.window(docs)
    }

    /// Total match count and the ordered, windowed records, both taken from
    /// one scan.
    pub fn page<T: Record>(&self) -> Result<(usize, Vec<T>), StoreError> {
        let docs = self.matching(T::BUCKET)?;
        let total = docs.len();
        Ok((total, self.window(docs)?))
    }

    fn window<T: Record>(&self, mut docs: Vec<serde_json::Value>) -> Result<Vec<T>, StoreError> {
        if let Some(field) = &self.order_by {
            docs.sort_by(|a, b| compare_values(lookup(a, field), lookup(b, field)));
        }
        if self.reverse {
            docs.reverse();
        }
        docs.into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }

    /// First record of the ordered, windowed result.
    pub fn first<T: Record>(&self) -> Result<Option<T>, StoreError> {
        let query = Query {
            tx: self.tx,
            matcher: self.matcher.clone(),
            order_by: self.order_by.clone(),
            reverse: self.reverse,
            skip: self.skip,
            limit: Some(1),
        };
        Ok(query.find()?.into_iter().next())
    }
}
