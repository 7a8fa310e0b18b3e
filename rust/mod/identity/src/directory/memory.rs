use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{DirectoryClient, DirectoryConnector, DirectoryEntry, DirectoryError, SearchRequest};
use crate::model::DirectoryDescriptor;

/// Scripted directory for pipeline tests.
#[derive(Clone, Default)]
pub(crate) struct MemoryDirectory {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<Vec<DirectoryEntry>>,
    /// dn -> password
    passwords: Mutex<HashMap<String, String>>,
    unreachable: Mutex<bool>,
    search_delay: Mutex<Option<Duration>>,
    connects: AtomicUsize,
    searches: AtomicUsize,
}

impl MemoryDirectory {
    pub(crate) fn new(entries: Vec<DirectoryEntry>) -> Self {
        let dir = Self::default();
        *dir.inner.entries.lock().unwrap() = entries;
        dir
    }

    pub(crate) fn set_password(&self, dn: &str, password: &str) {
        self.inner
            .passwords
            .lock()
            .unwrap()
            .insert(dn.to_string(), password.to_string());
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        *self.inner.unreachable.lock().unwrap() = unreachable;
    }

    pub(crate) fn set_search_delay(&self, delay: Duration) {
        *self.inner.search_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn searches(&self) -> usize {
        self.inner.searches.load(Ordering::SeqCst)
    }

    /// Supports `(attr=value)`, `(&(...)(attr=value))` and match-all filters.
    fn matching(&self, filter: &str) -> Vec<DirectoryEntry> {
        let entries = self.inner.entries.lock().unwrap().clone();
        let term = filter
            .rsplit('(')
            .next()
            .unwrap_or("")
            .trim_end_matches(')');
        match term.split_once('=') {
            Some((attr, value)) if value != "*" => entries
                .into_iter()
                .filter(|e| {
                    e.attrs
                        .get(attr)
                        .map(|vs| vs.iter().any(|v| v == value))
                        .unwrap_or(false)
                })
                .collect(),
            _ => entries,
        }
    }
}

#[async_trait]
impl DirectoryConnector for MemoryDirectory {
    async fn connect(
        &self,
        _descriptor: &DirectoryDescriptor,
    ) -> Result<Box<dyn DirectoryClient>, DirectoryError> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        if *self.inner.unreachable.lock().unwrap() {
            return Err(DirectoryError::Unavailable("connection refused".into()));
        }
        Ok(Box::new(MemoryClient { dir: self.clone() }))
    }
}

struct MemoryClient {
    dir: MemoryDirectory,
}

#[async_trait]
impl DirectoryClient for MemoryClient {
    async fn search(
        &mut self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        self.dir.inner.searches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.dir.inner.search_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DirectoryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(DirectoryError::Cancelled);
        }
        let mut entries = self.dir.matching(&request.filter);
        if request.size_limit > 0 {
            entries.truncate(request.size_limit as usize);
        }
        Ok(entries)
    }

    async fn bind(&mut self, request: &SearchRequest, password: &str) -> Result<(), DirectoryError> {
        if password.is_empty() {
            return Err(DirectoryError::InvalidCredentials);
        }
        let entries = self.dir.matching(&request.filter);
        let [entry] = entries.as_slice() else {
            return Err(DirectoryError::InvalidCredentials);
        };
        let passwords = self.dir.inner.passwords.lock().unwrap();
        match passwords.get(&entry.dn) {
            Some(p) if p == password => Ok(()),
            _ => Err(DirectoryError::InvalidCredentials),
        }
    }
}
