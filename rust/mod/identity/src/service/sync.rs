use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::service::IdentityError;

/// Counters of one background sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Entries returned by the directory search.
    pub found: usize,
    /// Users provisioned by this run.
    pub inserted: usize,
    /// Entries already present locally.
    pub existing: usize,
    /// Entries dropped for a missing name or email.
    pub incomplete: usize,
    /// Entries whose provisioning failed and was rolled back.
    pub failed: usize,
    /// The run stopped early on cancellation.
    pub cancelled: bool,
}

/// Single-flight registry of running syncs, keyed by directory id.
#[derive(Debug, Default, Clone)]
pub(crate) struct SyncGuard {
    running: Arc<Mutex<HashSet<String>>>,
}

impl SyncGuard {
    /// Claim the slot for `directory_id`. `Conflict` if a sync already holds it.
    pub(crate) fn acquire(&self, directory_id: &str) -> Result<SyncPermit, IdentityError> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| IdentityError::Internal("sync registry poisoned".into()))?;
        if !running.insert(directory_id.to_string()) {
            return Err(IdentityError::Conflict(format!(
                "a sync of directory {} is already running",
                directory_id
            )));
        }
        Ok(SyncPermit {
            running: Arc::clone(&self.running),
            directory_id: directory_id.to_string(),
        })
    }

    pub(crate) fn is_running(&self, directory_id: &str) -> bool {
        self.running
            .lock()
            .map(|r| r.contains(directory_id))
            .unwrap_or(false)
    }
}

/// Held by a running sync; releases the slot on drop.
#[derive(Debug)]
pub(crate) struct SyncPermit {
    running: Arc<Mutex<HashSet<String>>>,
    directory_id: String,
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&self.directory_id);
        }
    }
}

/// Handle to a background sync. Dropping it detaches the task.
pub struct SyncHandle {
    pub(crate) join: JoinHandle<Result<SyncReport, IdentityError>>,
    pub(crate) cancel: CancellationToken,
}

impl SyncHandle {
    /// Ask the task to stop. An in-flight directory search is abandoned;
    /// entries already provisioned stay.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task and return its report.
    pub async fn wait(self) -> Result<SyncReport, IdentityError> {
        self.join
            .await
            .map_err(|e| IdentityError::Internal(format!("sync task failed: {}", e)))?
    }
}
