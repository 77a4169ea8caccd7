//! Shared ownership of all batches and the id sequence.
//!
//! Every access goes through one reader/writer lock. Critical sections only
//! touch the in-memory map; nothing awaits while a guard is alive.

use crate::error::CheckError;
use crate::message::{Batch, BatchId, LinkState};
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
struct Inner {
    batches: BTreeMap<BatchId, Batch>,
    next_id: BatchId,
}

/// Thread-safe repository of batches.
#[derive(Debug)]
pub struct Store {
    inner: RwLock<Inner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                batches: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    // Every mutation is a single assignment or insert; a poisoned lock still
    // guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a new batch with one `Unknown` link per URL and returns its id.
    pub fn create_batch(&self, urls: &[String]) -> BatchId {
        let mut inner = self.write();
        let id = inner.next_id;
        inner.batches.insert(id, Batch::new(id, urls));
        inner.next_id += 1;
        tracing::debug!(batch = id, links = urls.len(), "batch created");
        id
    }

    pub fn get_batch(&self, id: BatchId) -> Result<Batch, CheckError> {
        self.read()
            .batches
            .get(&id)
            .cloned()
            .ok_or(CheckError::NotFound(id))
    }

    /// Records a check result. Stale tasks pointing at a removed batch or an
    /// out-of-range link are ignored.
    pub fn update_link_state(
        &self,
        batch_id: BatchId,
        link_index: usize,
        state: LinkState,
        checked_at: DateTime<Utc>,
    ) {
        let mut inner = self.write();
        match inner
            .batches
            .get_mut(&batch_id)
            .and_then(|batch| batch.links.get_mut(link_index))
        {
            Some(link) => {
                link.state = state;
                link.checked_at = Some(checked_at);
            }
            None => {
                tracing::debug!(
                    batch = batch_id,
                    link = link_index,
                    "dropping result for missing link"
                );
            }
        }
    }

    pub fn contains_batch(&self, id: BatchId) -> bool {
        self.read().batches.contains_key(&id)
    }

    /// True iff the batch exists and none of its links is still `Unknown`.
    pub fn is_batch_completed(&self, id: BatchId) -> bool {
        self.read()
            .batches
            .get(&id)
            .is_some_and(Batch::is_completed)
    }

    /// Removes a batch. Its id is never handed out again.
    pub fn delete_batch(&self, id: BatchId) -> Result<(), CheckError> {
        self.write()
            .batches
            .remove(&id)
            .map(|_| ())
            .ok_or(CheckError::NotFound(id))
    }

    /// Returns the requested batches in request order, skipping unknown ids.
    pub fn batches(&self, ids: &[BatchId]) -> Vec<Batch> {
        let inner = self.read();
        ids.iter()
            .filter_map(|id| inner.batches.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn next_id(&self) -> BatchId {
        self.read().next_id
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.read();
        Snapshot {
            batches: inner.batches.clone(),
            next_id: inner.next_id,
        }
    }

    /// Replaces the whole content of the store with a validated snapshot.
    pub fn restore(&self, snapshot: Snapshot) -> Result<(), CheckError> {
        let snapshot = snapshot.validate()?;
        let mut inner = self.write();
        inner.batches = snapshot.batches;
        inner.next_id = snapshot.next_id;
        Ok(())
    }

    pub fn save_snapshot(&self) -> Result<Vec<u8>, CheckError> {
        self.snapshot().to_bytes()
    }

    pub fn load_snapshot(&self, bytes: &[u8]) -> Result<(), CheckError> {
        self.restore(Snapshot::from_bytes(bytes)?)
    }
}
