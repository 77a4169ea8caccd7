use super::Reporter;
use crate::message::{Batch, Link};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt::Write;

const URL_WIDTH: usize = 60;
const STATE_WIDTH: usize = 12;

/// Reporter producing a plain-text table per batch.
pub struct TextReporter;

impl TextReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextReporter {
    fn default() -> Self {
        Self::new()
    }
}

// Long URLs are cut to keep the columns aligned.
fn truncate_url(url: &str) -> String {
    if url.chars().count() > URL_WIDTH {
        let head: String = url.chars().take(URL_WIDTH - 3).collect();
        format!("{head}...")
    } else {
        url.to_string()
    }
}

fn write_link(out: &mut String, link: &Link) -> std::fmt::Result {
    let checked = link
        .checked_at
        .map_or_else(|| "-".to_string(), |at| at.format("%H:%M:%S").to_string());
    writeln!(
        out,
        "{:<url$}  {:<state$}  {}",
        truncate_url(&link.url),
        link.state.as_str(),
        checked,
        url = URL_WIDTH,
        state = STATE_WIDTH,
    )
}

impl Reporter for TextReporter {
    fn render(&self, batches: &[Batch], generated_at: DateTime<Utc>) -> Result<Vec<u8>> {
        let mut out = String::new();
        writeln!(out, "Link Status Report")?;
        writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;

        for batch in batches {
            writeln!(out)?;
            writeln!(
                out,
                "Batch #{} (Created: {})",
                batch.id,
                batch.created_at.format("%Y-%m-%d")
            )?;
            writeln!(
                out,
                "{:<url$}  {:<state$}  {}",
                "URL",
                "Status",
                "Checked At",
                url = URL_WIDTH,
                state = STATE_WIDTH,
            )?;
            for link in &batch.links {
                write_link(&mut out, link)?;
            }
        }

        Ok(out.into_bytes())
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn name(&self) -> &'static str {
        "text"
    }
}
