//! Autoscaling overview report

use super::{FleetAggregator, ServiceRef};
use crate::arn;
use crate::error::{Error, Result, Warning};
use crate::models::{ScalingMetric, ScalingPolicy};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A target-tracking goal as shown in the overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingTarget {
    pub metric: ScalingMetric,
    pub value: f64,
}

/// Scaling bounds, counts and policy targets of one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingOverviewRecord {
    pub service: String,
    pub running_count: i32,
    pub desired_count: i32,
    /// `None` when the service has no scalable target
    pub min_capacity: Option<i32>,
    pub max_capacity: Option<i32>,
    pub targets: Vec<TrackingTarget>,
}

impl ScalingOverviewRecord {
    /// `CPU:70 | MEMORY:80 | REQUESTS:1000`
    pub fn targets_label(&self) -> String {
        self.targets
            .iter()
            .map(|t| format!("{}:{}", t.metric.label(), t.value))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScalingReport {
    pub cluster: String,
    pub records: Vec<ScalingOverviewRecord>,
    pub warnings: Vec<Warning>,
}

impl FleetAggregator {
    /// Scalable target bounds and tracking policies of every service in a cluster
    pub async fn autoscaling_report(&self, cluster: &str) -> Result<ScalingReport> {
        if cluster.trim().is_empty() {
            return Err(Error::validation("cluster must not be empty"));
        }

        let (services, mut warnings) = self.describe_fleet(&[cluster.to_string()], None).await?;

        let client = self.client.clone();
        let report = self
            .fanout()
            .run(
                services.into_iter().map(ServiceRef::from).collect(),
                move |service: ServiceRef| {
                    let client = client.clone();
                    async move {
                        let state = service.state;
                        let resource_id = arn::scaling_resource_id(&state.cluster_arn, &state.service_name);

                        let (targets, policies) = tokio::join!(
                            client.describe_scalable_targets(&resource_id),
                            client.describe_scaling_policies(&resource_id)
                        );
                        let target = targets?.into_iter().next();

                        Ok::<_, Error>(ScalingOverviewRecord {
                            service: state.service_name,
                            running_count: state.running_count,
                            desired_count: state.desired_count,
                            min_capacity: target.as_ref().map(|t| t.min_capacity),
                            max_capacity: target.as_ref().map(|t| t.max_capacity),
                            targets: tracking_targets(policies?),
                        })
                    }
                },
            )
            .await?;

        warnings.extend(report.warnings);
        info!(
            cluster,
            services = report.results.len(),
            "Autoscaling report complete"
        );

        Ok(ScalingReport {
            cluster: arn::cluster_name(cluster).to_string(),
            records: report.results,
            warnings,
        })
    }
}

/// Policies ordered CPU, memory, request count
fn tracking_targets(mut policies: Vec<ScalingPolicy>) -> Vec<TrackingTarget> {
    policies.sort_by_key(|p| p.metric as u8);
    policies
        .into_iter()
        .map(|p| TrackingTarget {
            metric: p.metric,
            value: p.target_value,
        })
        .collect()
}
