//! Service utilization report

use super::{FleetAggregator, ServiceRef};
use crate::arn;
use crate::client::{collect_pages, ControlPlane, DESCRIBE_BATCH_SIZE};
use crate::error::{Error, Result, Warning};
use crate::models::{MetricQuery, ServiceBatch, ServiceState, UtilizationMetric};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Merged service state and utilization, built only for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedServiceRecord {
    pub cluster: String,
    pub service: String,
    pub service_arn: String,
    pub status: String,
    /// `family:revision` of the current task definition
    pub task_definition: Option<String>,
    pub desired_count: i32,
    pub running_count: i32,
    pub pending_count: i32,
    pub launch_type: String,
    /// Mean CPU utilization percent over the trailing day; `None` if unavailable
    pub cpu_utilization: Option<f64>,
    pub memory_utilization: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceReport {
    pub records: Vec<AggregatedServiceRecord>,
    pub warnings: Vec<Warning>,
}

/// One describe call's worth of identifiers
struct DescribeBatch {
    cluster: String,
    services: Vec<String>,
}

impl fmt::Display for DescribeBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.services.iter().map(|s| arn::service_name(s)).collect();
        write!(f, "{}/[{}]", arn::cluster_name(&self.cluster), names.join(","))
    }
}

impl FleetAggregator {
    /// Explicit clusters, or every cluster the control plane knows about
    ///
    /// A cluster named more than once (by name or ARN) is kept at its first position.
    pub async fn resolve_clusters(&self, clusters: &[String]) -> Result<Vec<String>> {
        let explicit = distinct_clusters(clusters.iter().filter(|c| !c.trim().is_empty()).cloned());
        if !explicit.is_empty() {
            return Ok(explicit);
        }

        let discovered = distinct_clusters(self.client.list_clusters().await?);
        if discovered.is_empty() {
            return Err(Error::NoClustersFound);
        }
        debug!(count = discovered.len(), "Discovered clusters");
        Ok(discovered)
    }

    /// Every service ARN in a cluster, following continuation tokens
    pub async fn list_service_arns(&self, cluster: &str) -> Result<Vec<String>> {
        collect_pages(|next_token| self.client.list_services(cluster, next_token)).await
    }

    /// Describe every service across the cluster set, optionally filtered by name
    ///
    /// Per-batch and per-service describe failures become warnings, as does a
    /// cluster whose services cannot be listed. Only when no cluster can be
    /// listed does the listing error abort the report.
    pub async fn describe_fleet(
        &self,
        clusters: &[String],
        filter: Option<&str>,
    ) -> Result<(Vec<ServiceState>, Vec<Warning>)> {
        let clusters = self.resolve_clusters(clusters).await?;
        let filter = filter.filter(|f| !f.is_empty());

        let mut batches = Vec::new();
        let mut listing_warnings = Vec::new();
        let mut listing_error = None;
        let mut seen = HashSet::new();
        for cluster in &clusters {
            if self.abort.is_aborted() {
                return Err(Error::Cancelled);
            }

            let listed = match self.list_service_arns(cluster).await {
                Ok(listed) => listed,
                Err(err) => {
                    warn!(cluster = %cluster, error = %err, "Failed to list services");
                    listing_warnings.push(Warning::new(cluster.clone(), err.to_string()));
                    listing_error.get_or_insert(err);
                    continue;
                }
            };

            let arns: Vec<String> = listed
                .into_iter()
                .filter(|id| filter.map_or(true, |f| arn::service_name(id) == f))
                .filter(|id| seen.insert(id.clone()))
                .collect();

            debug!(cluster = %cluster, services = arns.len(), "Listed services");

            batches.extend(arns.chunks(DESCRIBE_BATCH_SIZE).map(|chunk| DescribeBatch {
                cluster: cluster.clone(),
                services: chunk.to_vec(),
            }));
        }

        // Nothing could be listed at all
        if let Some(err) = listing_error {
            if listing_warnings.len() == clusters.len() {
                return Err(err);
            }
        }

        let client = self.client.clone();
        let report = self
            .fanout()
            .run(batches, move |batch: DescribeBatch| {
                let client = client.clone();
                async move { client.describe_services(&batch.cluster, &batch.services).await }
            })
            .await?;

        let mut warnings = listing_warnings;
        warnings.extend(report.warnings);
        let mut services = Vec::new();
        for ServiceBatch {
            services: described,
            failures,
        } in report.results
        {
            services.extend(described);
            warnings.extend(failures.into_iter().map(|failure| {
                let reason = match failure.detail {
                    Some(detail) => format!("{} ({detail})", failure.reason),
                    None => failure.reason,
                };
                Warning::new(failure.arn, reason)
            }));
        }

        if services.is_empty() {
            if let Some(service) = filter {
                return Err(Error::ServiceNotFound {
                    service: service.to_string(),
                    cluster: match clusters.as_slice() {
                        [only] => Some(arn::cluster_name(only).to_string()),
                        _ => None,
                    },
                });
            }
        }

        Ok((services, warnings))
    }

    /// Describe the fleet and attach trailing-day CPU and memory averages
    pub async fn service_report(
        &self,
        clusters: &[String],
        filter: Option<&str>,
    ) -> Result<ServiceReport> {
        let (services, mut warnings) = self.describe_fleet(clusters, filter).await?;

        let client = self.client.clone();
        let report = self
            .fanout()
            .run(
                services.into_iter().map(ServiceRef::from).collect(),
                move |service: ServiceRef| {
                    let client = client.clone();
                    async move { Ok::<_, Error>(utilization(client.as_ref(), service.state).await) }
                },
            )
            .await?;

        warnings.extend(report.warnings);
        let mut records = Vec::with_capacity(report.results.len());
        for (record, metric_warnings) in report.results {
            records.push(record);
            warnings.extend(metric_warnings);
        }

        info!(
            services = records.len(),
            warnings = warnings.len(),
            "Service report complete"
        );

        Ok(ServiceReport { records, warnings })
    }
}

/// Fetch both metrics in parallel; a failed metric is left empty with a warning
async fn utilization(
    client: &dyn ControlPlane,
    state: ServiceState,
) -> (AggregatedServiceRecord, Vec<Warning>) {
    let cluster = arn::cluster_name(&state.cluster_arn).to_string();
    let cpu_query = MetricQuery::daily(&cluster, &state.service_name, UtilizationMetric::Cpu);
    let memory_query = MetricQuery::daily(&cluster, &state.service_name, UtilizationMetric::Memory);

    let (cpu, memory) = tokio::join!(
        client.metric_average(&cpu_query),
        client.metric_average(&memory_query)
    );

    let mut warnings = Vec::new();
    let mut sample = |result: Result<f64>, metric: UtilizationMetric| match result {
        Ok(value) => Some(value),
        Err(err) => {
            warnings.push(Warning::new(
                state.service_arn.clone(),
                format!("{}: {err}", metric.metric_name()),
            ));
            None
        }
    };
    let cpu_utilization = sample(cpu, UtilizationMetric::Cpu);
    let memory_utilization = sample(memory, UtilizationMetric::Memory);

    let record = AggregatedServiceRecord {
        launch_type: state.launch_label(),
        task_definition: state
            .task_definition
            .as_deref()
            .map(|td| arn::short_name(td).to_string()),
        cluster,
        service: state.service_name,
        service_arn: state.service_arn,
        status: state.status,
        desired_count: state.desired_count,
        running_count: state.running_count,
        pending_count: state.pending_count,
        cpu_utilization,
        memory_utilization,
    };

    (record, warnings)
}

/// Drop repeated clusters, comparing by cluster name so a name and its ARN collapse
fn distinct_clusters(clusters: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    clusters
        .into_iter()
        .filter(|cluster| seen.insert(arn::cluster_name(cluster).to_string()))
        .collect()
}
