//! Service report commands

use super::Session;
use crate::output::{color_counts, format_percent, print_json, print_table, print_warnings, OutputFormat};
use anyhow::{Context, Result};
use nami_lib::fleet::AggregatedServiceRecord;
use tabled::Tabled;

/// Row for the services table
#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "CLUSTER")]
    cluster: String,
    #[tabled(rename = "TASK DEFINITION")]
    task_definition: String,
    #[tabled(rename = "RUNNING")]
    running: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "MEMORY")]
    memory: String,
    #[tabled(rename = "LAUNCH")]
    launch: String,
}

impl From<&AggregatedServiceRecord> for ServiceRow {
    fn from(record: &AggregatedServiceRecord) -> Self {
        Self {
            name: record.service.clone(),
            cluster: record.cluster.clone(),
            task_definition: record.task_definition.clone().unwrap_or_else(|| "-".to_string()),
            running: color_counts(record.running_count, record.desired_count),
            cpu: format_percent(record.cpu_utilization),
            memory: format_percent(record.memory_utilization),
            launch: record.launch_type.clone(),
        }
    }
}

/// Describe services across clusters with trailing-day utilization
pub async fn get_services(
    session: &Session,
    service: Option<String>,
    clusters: Vec<String>,
) -> Result<()> {
    let clusters = session.clusters(clusters);
    let report = session
        .aggregator()
        .service_report(&clusters, service.as_deref())
        .await
        .context("Failed to build service report")?;

    session
        .logger
        .log_report("services", report.records.len(), &report.warnings);

    match session.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let rows: Vec<ServiceRow> = report.records.iter().map(ServiceRow::from).collect();
            print_table(&rows, "No services found");
            print_warnings(&report.warnings);
        }
    }

    Ok(())
}
