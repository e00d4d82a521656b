use crate::arn;
use crate::client::ControlPlane;
use crate::error::{Error, Result};
use crate::models::{ScalableTarget, ScalingMetric, ScalingPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Desired scaling configuration for one service
///
/// A target of 0 leaves that policy untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalingRequest {
    pub cluster: String,
    pub service: String,
    pub min_capacity: i32,
    pub max_capacity: i32,
    pub cpu_target: u32,
    pub memory_target: u32,
    pub request_target: u32,
}

/// What was registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingOutcome {
    pub resource_id: String,
    pub min_capacity: i32,
    pub max_capacity: i32,
    pub policies: Vec<ScalingPolicy>,
}

pub struct ScalingPolicyRegistrar {
    client: Arc<dyn ControlPlane>,
}

impl ScalingPolicyRegistrar {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self { client }
    }

    /// Register the scalable target, then each requested policy
    ///
    /// Stops at the first failure; policies registered before it stay in place.
    pub async fn register(&self, request: &ScalingRequest) -> Result<ScalingOutcome> {
        validate(request)?;

        let resource_id = arn::scaling_resource_id(&request.cluster, &request.service);
        self.client
            .register_scalable_target(&ScalableTarget {
                resource_id: resource_id.clone(),
                min_capacity: request.min_capacity,
                max_capacity: request.max_capacity,
            })
            .await?;

        info!(
            resource_id = %resource_id,
            min = request.min_capacity,
            max = request.max_capacity,
            "Registered scalable target"
        );

        let mut policies = Vec::new();

        for (metric, target) in [
            (ScalingMetric::Cpu, request.cpu_target),
            (ScalingMetric::Memory, request.memory_target),
        ] {
            if target == 0 {
                continue;
            }
            let policy = ScalingPolicy::target_tracking(metric, f64::from(target));
            self.put(&resource_id, &policy).await?;
            policies.push(policy);
        }

        if request.request_target > 0 {
            let label = self
                .request_resource_label(&request.cluster, &request.service)
                .await?;
            let policy = ScalingPolicy::target_tracking(
                ScalingMetric::RequestCountPerTarget,
                f64::from(request.request_target),
            )
            .with_resource_label(label);
            self.put(&resource_id, &policy).await?;
            policies.push(policy);
        }

        Ok(ScalingOutcome {
            resource_id,
            min_capacity: request.min_capacity,
            max_capacity: request.max_capacity,
            policies,
        })
    }

    /// Resolve `<lb-type>/<lb-name>/<lb-id>/targetgroup/<tg-name>/<tg-id>` for a service
    pub async fn request_resource_label(&self, cluster: &str, service: &str) -> Result<String> {
        let state = self
            .client
            .describe_service(cluster, service)
            .await?
            .ok_or_else(|| Error::ServiceNotFound {
                service: service.to_string(),
                cluster: Some(cluster.to_string()),
            })?;

        let target_group_arn =
            state
                .first_target_group()
                .ok_or_else(|| Error::LoadBalancerNotFound {
                    service: service.to_string(),
                })?;

        let target_group = self
            .client
            .describe_target_group(target_group_arn)
            .await?
            .ok_or_else(|| Error::TargetGroupNotFound {
                arn: target_group_arn.to_string(),
            })?;

        let load_balancer_arn =
            target_group
                .load_balancer_arns
                .first()
                .ok_or_else(|| Error::TargetGroupNotFound {
                    arn: target_group_arn.to_string(),
                })?;

        let label = arn::resource_label(load_balancer_arn, target_group_arn)?;
        debug!(service, label = %label, "Derived request-count resource label");
        Ok(label)
    }

    async fn put(&self, resource_id: &str, policy: &ScalingPolicy) -> Result<()> {
        self.client.put_scaling_policy(resource_id, policy).await?;
        info!(
            resource_id,
            policy = %policy.name,
            target = policy.target_value,
            "Registered scaling policy"
        );
        Ok(())
    }
}

fn validate(request: &ScalingRequest) -> Result<()> {
    if request.cluster.trim().is_empty() {
        return Err(Error::validation("cluster must not be empty"));
    }
    if request.service.trim().is_empty() {
        return Err(Error::validation("service must not be empty"));
    }
    if request.min_capacity < 0 {
        return Err(Error::validation(format!(
            "minimum capacity {} must not be negative",
            request.min_capacity
        )));
    }
    if request.min_capacity > request.max_capacity {
        return Err(Error::validation(format!(
            "minimum capacity {} exceeds maximum capacity {}",
            request.min_capacity, request.max_capacity
        )));
    }
    Ok(())
}
