//! Task definition revision commands

use super::Session;
use crate::output::{print_json, print_table, print_warnings, OutputFormat};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use nami_lib::fleet::RevisionRecord;
use tabled::Tabled;

#[derive(Tabled)]
struct RevisionRow {
    #[tabled(rename = "REVISION")]
    revision: String,
    #[tabled(rename = "IMAGE")]
    image: String,
    #[tabled(rename = "REGISTERED")]
    registered: String,
}

impl From<&RevisionRecord> for RevisionRow {
    fn from(record: &RevisionRecord) -> Self {
        Self {
            revision: record.revision.clone(),
            image: record.images.join("\n"),
            registered: record
                .registered_at
                .as_ref()
                .map_or_else(|| "-".to_string(), format_timestamp),
        }
    }
}

/// List the active revisions of a family with their images
pub async fn get_revisions(session: &Session, family: &str) -> Result<()> {
    let report = session
        .aggregator()
        .revision_history(family)
        .await
        .with_context(|| format!("Failed to list revisions of {}", family))?;

    session
        .logger
        .log_report("revisions", report.records.len(), &report.warnings);

    match session.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let rows: Vec<RevisionRow> = report.records.iter().map(RevisionRow::from).collect();
            print_table(&rows, "No revisions found");
            print_warnings(&report.warnings);
        }
    }

    Ok(())
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_row_lists_every_image() {
        let record = RevisionRecord {
            revision: "web:3".to_string(),
            images: vec!["nginx:1.25".to_string(), "envoy:1.27".to_string()],
            registered_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()),
        };

        let row = RevisionRow::from(&record);

        assert_eq!(row.revision, "web:3");
        assert_eq!(row.image, "nginx:1.25\nenvoy:1.27");
        assert_eq!(row.registered, "2024-03-01 12:30:00 UTC");
    }

    #[test]
    fn test_row_without_registration_time() {
        let record = RevisionRecord {
            revision: "web:1".to_string(),
            images: vec![],
            registered_at: None,
        };

        assert_eq!(RevisionRow::from(&record).registered, "-");
    }
}
