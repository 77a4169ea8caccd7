mod json;
mod text;

use crate::message::Batch;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub use json::JsonReporter;
pub use text::TextReporter;

/// Trait for the different report formats.
///
/// Reporters receive a read-only view of the requested batches and render it
/// into a downloadable document.
pub trait Reporter: Send + Sync {
    fn render(&self, batches: &[Batch], generated_at: DateTime<Utc>) -> Result<Vec<u8>>;

    /// MIME type of the rendered document.
    fn content_type(&self) -> &'static str;

    /// File extension used in the download name.
    fn extension(&self) -> &'static str;

    /// Returns the name of this reporter for logging purposes.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

pub fn create_reporter(format: ReportFormat) -> Box<dyn Reporter> {
    match format {
        ReportFormat::Text => Box::new(TextReporter::new()),
        ReportFormat::Json => Box::new(JsonReporter::new()),
    }
}

/// Download name such as `link_report_2025-03-01_10-15-30.txt`.
pub fn report_filename(reporter: &dyn Reporter, generated_at: DateTime<Utc>) -> String {
    format!(
        "link_report_{}.{}",
        generated_at.format("%Y-%m-%d_%H-%M-%S"),
        reporter.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_filename() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 15, 30).unwrap();

        let text = create_reporter(ReportFormat::Text);
        assert_eq!(
            report_filename(text.as_ref(), at),
            "link_report_2025-03-01_10-15-30.txt"
        );

        let json = create_reporter(ReportFormat::Json);
        assert_eq!(json.name(), "json");
        assert_eq!(
            report_filename(json.as_ref(), at),
            "link_report_2025-03-01_10-15-30.json"
        );
    }
}
