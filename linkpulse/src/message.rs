/// Message module for the linkpulse link checker
///
/// This module defines the data structures shared by the components of the
/// system: links and batches owned by the store, and the tasks handed from the
/// submission path to the workers.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a batch, assigned by the store starting at 1.
pub type BatchId = u64;

/// Availability of a single link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    #[default]
    Unknown,
    Available,
    Unavailable,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Unknown => "unknown",
            LinkState::Available => "available",
            LinkState::Unavailable => "unavailable",
        }
    }

    /// Returns true once a worker has produced a result for the link.
    pub fn is_checked(&self) -> bool {
        !matches!(self, LinkState::Unknown)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One URL of a batch together with its latest check result.
///
/// # Fields
/// * `url` - The URL as submitted
/// * `state` - Result of the most recent check, `Unknown` until checked
/// * `checked_at` - When the most recent check finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub state: LinkState,
    #[serde(rename = "checked at", default)]
    pub checked_at: Option<DateTime<Utc>>,
}

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: LinkState::Unknown,
            checked_at: None,
        }
    }
}

/// A group of links submitted together.
///
/// The number of links never changes after creation; only the state of the
/// individual links does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub links: Vec<Link>,
    #[serde(rename = "created at")]
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(id: BatchId, urls: &[String]) -> Self {
        Self {
            id,
            links: urls.iter().map(Link::new).collect(),
            created_at: Utc::now(),
        }
    }

    /// True when no link is left in the `Unknown` state.
    pub fn is_completed(&self) -> bool {
        self.links.iter().all(|link| link.state.is_checked())
    }
}

/// A single scheduled check, carried through the task queue.
///
/// # Fields
/// * `batch_id` - Batch owning the link
/// * `link_index` - Position of the link inside the batch
/// * `url` - URL to probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub batch_id: BatchId,
    pub link_index: usize,
    pub url: String,
}
