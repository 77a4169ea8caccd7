use super::Reporter;
use crate::message::Batch;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Reporter emitting the batches as one JSON document.
pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for JsonReporter {
    fn render(&self, batches: &[Batch], generated_at: DateTime<Utc>) -> Result<Vec<u8>> {
        let batches: Vec<_> = batches
            .iter()
            .map(|batch| {
                serde_json::json!({
                    "id": batch.id,
                    "created_at": batch.created_at.to_rfc3339(),
                    "completed": batch.is_completed(),
                    "links": batch.links.iter().map(|link| serde_json::json!({
                        "url": link.url,
                        "state": link.state,
                        "checked_at": link.checked_at.map(|at| at.to_rfc3339()),
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();

        let report = serde_json::json!({
            "generated_at": generated_at.to_rfc3339(),
            "batches": batches,
        });
        serde_json::to_vec_pretty(&report).with_context(|| "Failed to encode JSON report")
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
