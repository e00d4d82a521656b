//! Autoscaling commands

use super::Session;
use crate::output::{format_count, print_json, print_success, print_table, print_warnings, OutputFormat};
use anyhow::{Context, Result};
use nami_lib::fleet::ScalingOverviewRecord;
use nami_lib::ScalingRequest;
use tabled::Tabled;

/// Flags of `nami set autoscale`
pub struct AutoscaleArgs {
    pub cluster: Option<String>,
    pub service: String,
    pub min: i32,
    pub max: i32,
    pub cpu: u32,
    pub memory: u32,
    pub requests: u32,
}

/// Row for the autoscaling overview table
#[derive(Tabled)]
struct ScalingRow {
    #[tabled(rename = "SERVICE")]
    service: String,
    #[tabled(rename = "RUNNING")]
    running: i32,
    #[tabled(rename = "DESIRED")]
    desired: i32,
    #[tabled(rename = "MIN")]
    min: String,
    #[tabled(rename = "MAX")]
    max: String,
    #[tabled(rename = "TARGETS")]
    targets: String,
}

impl From<&ScalingOverviewRecord> for ScalingRow {
    fn from(record: &ScalingOverviewRecord) -> Self {
        let targets = record.targets_label();
        Self {
            service: record.service.clone(),
            running: record.running_count,
            desired: record.desired_count,
            min: format_count(record.min_capacity),
            max: format_count(record.max_capacity),
            targets: if targets.is_empty() { "-".to_string() } else { targets },
        }
    }
}

/// Show scaling bounds and policies of every service in a cluster
pub async fn get_autoscaling(session: &Session, cluster: Option<String>) -> Result<()> {
    let cluster = session.cluster(cluster)?;
    let report = session
        .aggregator()
        .autoscaling_report(&cluster)
        .await
        .with_context(|| format!("Failed to build autoscaling report for {}", cluster))?;

    session
        .logger
        .log_report("autoscaling", report.records.len(), &report.warnings);

    match session.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let rows: Vec<ScalingRow> = report.records.iter().map(ScalingRow::from).collect();
            print_table(&rows, "No services found");
            print_warnings(&report.warnings);
        }
    }

    Ok(())
}

/// Register the scalable target and the requested tracking policies
pub async fn set_autoscale(session: &Session, args: AutoscaleArgs) -> Result<()> {
    let request = ScalingRequest {
        cluster: session.cluster(args.cluster)?,
        service: args.service,
        min_capacity: args.min,
        max_capacity: args.max,
        cpu_target: args.cpu,
        memory_target: args.memory,
        request_target: args.requests,
    };

    let outcome = session
        .registrar()
        .register(&request)
        .await
        .with_context(|| format!("Failed to configure autoscaling for {}", request.service))?;

    session.logger.log_scaling(&outcome);

    match session.format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Table => {
            print_success(&format!(
                "{} scales between {} and {} tasks",
                outcome.resource_id, outcome.min_capacity, outcome.max_capacity
            ));
            for policy in &outcome.policies {
                print_success(&format!("{} targets {}", policy.name, policy.target_value));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nami_lib::fleet::TrackingTarget;
    use nami_lib::ScalingMetric;

    fn record(targets: Vec<TrackingTarget>) -> ScalingOverviewRecord {
        ScalingOverviewRecord {
            service: "api".to_string(),
            running_count: 2,
            desired_count: 3,
            min_capacity: Some(1),
            max_capacity: None,
            targets,
        }
    }

    #[test]
    fn test_row_renders_targets() {
        let row = ScalingRow::from(&record(vec![
            TrackingTarget { metric: ScalingMetric::Cpu, value: 70.0 },
            TrackingTarget { metric: ScalingMetric::RequestCountPerTarget, value: 1000.0 },
        ]));

        assert_eq!(row.targets, "CPU:70 | REQUESTS:1000");
        assert_eq!(row.min, "1");
        assert_eq!(row.max, "-");
    }

    #[test]
    fn test_row_without_policies() {
        assert_eq!(ScalingRow::from(&record(vec![])).targets, "-");
    }
}
