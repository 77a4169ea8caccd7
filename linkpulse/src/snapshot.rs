//! Point-in-time copy of the store and its flat-file persistence.
//!
//! The JSON layout keeps the `Batches` / `NextID` keys of the existing
//! `state.json` files so previously written state can be loaded as is.

use crate::error::CheckError;
use crate::message::{Batch, BatchId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Serializable projection of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "Batches", default)]
    pub batches: BTreeMap<BatchId, Batch>,
    #[serde(rename = "NextID")]
    pub next_id: BatchId,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            batches: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl Snapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CheckError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decodes and validates a snapshot.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CheckError> {
        let snapshot: Snapshot =
            serde_json::from_slice(bytes).map_err(|e| CheckError::Corrupt(e.to_string()))?;
        snapshot.validate()
    }

    /// Rejects snapshots whose keys disagree with the embedded batch ids and
    /// raises `next_id` above every stored id when it lags behind.
    pub fn validate(mut self) -> Result<Self, CheckError> {
        for (key, batch) in &self.batches {
            if *key == 0 {
                return Err(CheckError::Corrupt("batch id 0 is not allowed".to_string()));
            }
            if *key != batch.id {
                return Err(CheckError::Corrupt(format!(
                    "batch stored under id {} claims id {}",
                    key, batch.id
                )));
            }
        }

        let min_next_id = self
            .batches
            .keys()
            .next_back()
            .map_or(1, |max| max.saturating_add(1));
        if self.next_id < min_next_id {
            tracing::warn!(
                stored = self.next_id,
                restored = min_next_id,
                "snapshot next id lags behind stored batches, raising it"
            );
            self.next_id = min_next_id;
        }

        Ok(self)
    }
}

/// Snapshot location on disk.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the directory holding the snapshot file.
    pub async fn prepare(&self) -> Result<(), CheckError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Reads the snapshot. A missing file means there is no prior state.
    pub async fn load(&self) -> Result<Option<Snapshot>, CheckError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Snapshot::from_bytes(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the snapshot to a temporary file and renames it into place.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), CheckError> {
        self.prepare().await?;
        let bytes = snapshot.to_bytes()?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
